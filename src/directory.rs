//! Hook directory: which hook contract the core routes each flag to.
//!
//! A [`HookDirectory`] is a point-in-time snapshot taken with one `getAllHooks()` read.
//! It is never cached across protocol runs; a stale view would install a hook that
//! is already present or route to a flag that has none.

use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use tracing::instrument;

use crate::abi::{self, DynSolValue, EncodingSpec, TypeTag};
use crate::contracts::IHookedCore;
use crate::errors::{ProtocolError, ProtocolResult};
use crate::transport::Transport;

/// Single-bit identifier of a hook category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "FlagRepr", into = "u64")]
pub struct HookFlag(u64);

impl HookFlag {
    pub const BEFORE_MINT: HookFlag = HookFlag(1 << 1);
    pub const BEFORE_TRANSFER: HookFlag = HookFlag(1 << 2);
    pub const BEFORE_BURN: HookFlag = HookFlag(1 << 3);
    pub const BEFORE_APPROVE: HookFlag = HookFlag(1 << 4);
    pub const TOKEN_URI: HookFlag = HookFlag(1 << 5);
    pub const ROYALTY_INFO: HookFlag = HookFlag(1 << 6);

    const NAMED: [(&'static str, HookFlag); 6] = [
        ("beforeMint", HookFlag::BEFORE_MINT),
        ("beforeTransfer", HookFlag::BEFORE_TRANSFER),
        ("beforeBurn", HookFlag::BEFORE_BURN),
        ("beforeApprove", HookFlag::BEFORE_APPROVE),
        ("tokenURI", HookFlag::TOKEN_URI),
        ("royaltyInfo", HookFlag::ROYALTY_INFO),
    ];

    /// Wrap a raw flag value. Exactly one bit must be set.
    pub fn new(bits: u64) -> Result<Self, String> {
        if bits.is_power_of_two() {
            Ok(Self(bits))
        } else {
            Err(format!("hook flag must have exactly one bit set, got {bits:#x}"))
        }
    }

    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Conventional name for the ERC-721 categories.
    pub fn name(&self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(_, flag)| flag == self)
            .map(|(name, _)| *name)
    }
}

impl Display for HookFlag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}({:#x})", self.0),
            None => write!(f, "{:#x}", self.0),
        }
    }
}

impl FromStr for HookFlag {
    type Err = String;

    /// Accepts a category name (`beforeMint`), a decimal value or a `0x` value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((_, flag)) = Self::NAMED.iter().find(|(name, _)| name.eq_ignore_ascii_case(s)) {
            return Ok(*flag);
        }
        let bits = match s.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16),
            None => s.parse::<u64>(),
        }
        .map_err(|_| format!("unknown hook flag '{s}'"))?;
        Self::new(bits)
    }
}

impl From<HookFlag> for u64 {
    fn from(flag: HookFlag) -> Self {
        flag.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagRepr {
    Bits(u64),
    Name(String),
}

impl TryFrom<FlagRepr> for HookFlag {
    type Error = String;

    fn try_from(repr: FlagRepr) -> Result<Self, Self::Error> {
        match repr {
            FlagRepr::Bits(bits) => HookFlag::new(bits),
            FlagRepr::Name(name) => name.parse(),
        }
    }
}

/// One installed hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HookSlot {
    pub flag: HookFlag,
    pub address: Address,
}

/// Positional meaning of the fields returned by `getAllHooks()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryLayout(Vec<HookFlag>);

impl DirectoryLayout {
    pub fn new(flags: Vec<HookFlag>) -> Self {
        Self(flags)
    }

    /// `beforeMint, beforeTransfer, beforeBurn, beforeApprove, tokenURI, royaltyInfo`.
    pub fn erc721() -> Self {
        Self(HookFlag::NAMED.iter().map(|(_, flag)| *flag).collect())
    }

    pub fn flags(&self) -> &[HookFlag] {
        &self.0
    }

    /// Return shape of `getAllHooks()`: a static struct of addresses.
    fn return_spec(&self) -> EncodingSpec {
        EncodingSpec::new(vec![TypeTag::Tuple(vec![TypeTag::Address; self.0.len()])])
    }
}

impl Default for DirectoryLayout {
    fn default() -> Self {
        Self::erc721()
    }
}

/// Result of looking a flag up in a directory snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookLookup {
    /// A hook is installed at the flag.
    Installed(Address),
    /// The flag is known but no hook is installed; the behavior is disabled.
    Absent,
    /// The flag is not part of this core's layout.
    Unknown,
}

/// Snapshot of the core contract's flag → hook mapping.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HookDirectory {
    slots: BTreeMap<HookFlag, Option<Address>>,
}

impl HookDirectory {
    /// Build a snapshot from one address per layout flag. A zero address means absent.
    pub fn from_addresses(layout: &DirectoryLayout, addresses: &[Address]) -> ProtocolResult<Self> {
        if addresses.len() != layout.flags().len() {
            return Err(ProtocolError::DirectoryUnavailable(format!(
                "core returned {} hook addresses, layout expects {}",
                addresses.len(),
                layout.flags().len()
            )));
        }
        let slots = layout
            .flags()
            .iter()
            .zip(addresses)
            .map(|(flag, address)| (*flag, (!address.is_zero()).then_some(*address)))
            .collect();
        Ok(Self { slots })
    }

    pub fn lookup(&self, flag: HookFlag) -> HookLookup {
        match self.slots.get(&flag) {
            Some(Some(address)) => HookLookup::Installed(*address),
            Some(None) => HookLookup::Absent,
            None => HookLookup::Unknown,
        }
    }

    /// Installed hook at `flag`, if any.
    pub fn get(&self, flag: HookFlag) -> Option<Address> {
        self.slots.get(&flag).copied().flatten()
    }

    /// Installed hooks in flag order.
    pub fn slots(&self) -> impl Iterator<Item = HookSlot> + '_ {
        self.slots.iter().filter_map(|(flag, address)| {
            address.map(|address| HookSlot {
                flag: *flag,
                address,
            })
        })
    }

    /// Flags occupied by `hook`. A single hook contract may serve several categories.
    pub fn flags_of(&self, hook: Address) -> Vec<HookFlag> {
        self.slots()
            .filter(|slot| slot.address == hook)
            .map(|slot| slot.flag)
            .collect()
    }
}

impl Display for HookDirectory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (flag, address)) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match address {
                Some(address) => write!(f, "{flag}: {address}")?,
                None => write!(f, "{flag}: -")?,
            }
        }
        f.write_str("}")
    }
}

/// Read the full hook directory of `core` in one call.
///
/// # Errors
/// [`ProtocolError::DirectoryUnavailable`] when the read fails or the return data does
/// not match `layout`.
#[instrument(skip_all, fields(core = %core))]
pub async fn fetch_directory<T: Transport + ?Sized>(
    transport: &T,
    core: Address,
    layout: &DirectoryLayout,
) -> ProtocolResult<HookDirectory> {
    let calldata = IHookedCore::getAllHooksCall {}.abi_encode();
    let raw = transport.call(core, calldata.into()).await.map_err(|e| {
        tracing::warn!(error = %e, "getAllHooks failed");
        ProtocolError::DirectoryUnavailable(e.to_string())
    })?;

    let decoded = abi::decode(&layout.return_spec(), &raw)
        .map_err(|e| ProtocolError::DirectoryUnavailable(format!("undecodable getAllHooks return: {e}")))?;
    let addresses = match decoded.as_slice() {
        [DynSolValue::Tuple(fields)] => fields
            .iter()
            .map(|field| match field {
                DynSolValue::Address(address) => Ok(*address),
                other => Err(ProtocolError::DirectoryUnavailable(format!(
                    "unexpected getAllHooks field {other:?}"
                ))),
            })
            .collect::<ProtocolResult<Vec<_>>>()?,
        _ => {
            return Err(ProtocolError::DirectoryUnavailable(
                "unexpected getAllHooks return shape".to_string(),
            ));
        }
    };

    let directory = HookDirectory::from_addresses(layout, &addresses)?;
    tracing::debug!(%directory, "Fetched hook directory");
    Ok(directory)
}
