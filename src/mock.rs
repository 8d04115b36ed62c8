//! In-memory core contract for tests.
//!
//! [`MockCore`] answers the core's entry points at [`MockCore::ADDRESS`] and the
//! self-description entry points of every registered hook. Submissions are applied
//! immediately and each one is mined in its own block.

use alloy::primitives::{Address, Bytes, TxHash, U256, address, keccak256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use crate::abi::{self, DynSolValue, EncodingSpec, FunctionCall, TypeTag};
use crate::contracts::{IHook, IHookedCore};
use crate::directory::{DirectoryLayout, HookFlag};
use crate::negotiator::DEFAULT_SIGNATURE_FUNCTION;
use crate::transport::{PreparedCall, Receipt, SubmissionHandle, Transport, TransportError};

struct RegisteredHook {
    flags: Vec<HookFlag>,
    signature_selector: [u8; 4],
    signature: String,
}

#[derive(Default)]
struct State {
    slots: BTreeMap<HookFlag, Address>,
    hooks: HashMap<Address, RegisteredHook>,
    read_responses: HashMap<HookFlag, Bytes>,
    read_failure: Option<String>,
    receipt_revert: Option<String>,
    submit_rejection: Option<String>,
    stall: bool,
    ignore_installs: bool,
    calls: usize,
    submissions: usize,
    receipts: HashMap<TxHash, Receipt>,
    routed_writes: Vec<(HookFlag, U256, Bytes)>,
    mints: Vec<(Address, U256, Bytes)>,
}

#[derive(Default)]
pub(crate) struct MockCore {
    state: Mutex<State>,
}

impl MockCore {
    pub const ADDRESS: Address = address!("0x5adb0ad2f5fc8bd2a83b6a1b7afe9bbcb9e4d8d0");

    pub fn new() -> Self {
        Self::default()
    }

    /// Put `hook` at `flag` without a transaction.
    pub fn preinstall(&self, flag: HookFlag, hook: Address) {
        self.state.lock().unwrap().slots.insert(flag, hook);
    }

    /// Deploy a hook that reports `flags` and publishes `signature` through
    /// `getBeforeMintArgSignature()`.
    pub fn register_hook(&self, hook: Address, flags: &[HookFlag], signature: &str) {
        self.register_hook_with(hook, flags, DEFAULT_SIGNATURE_FUNCTION, signature);
    }

    pub fn register_hook_with(&self, hook: Address, flags: &[HookFlag], function: &str, signature: &str) {
        let selector = FunctionCall::parse(&format!("{function}()")).unwrap().selector();
        self.state.lock().unwrap().hooks.insert(
            hook,
            RegisteredHook {
                flags: flags.to_vec(),
                signature_selector: selector.0,
                signature: signature.to_string(),
            },
        );
    }

    /// Make every read fail at the RPC layer.
    pub fn fail_reads(&self, message: &str) {
        self.state.lock().unwrap().read_failure = Some(message.to_string());
    }

    /// Accept submissions but mine them as reverted with `reason`.
    pub fn revert_on_receipt(&self, reason: &str) {
        self.state.lock().unwrap().receipt_revert = Some(reason.to_string());
    }

    /// Refuse submissions as if gas estimation reverted with `reason`.
    pub fn reject_submissions(&self, reason: &str) {
        self.state.lock().unwrap().submit_rejection = Some(reason.to_string());
    }

    /// Never produce receipts.
    pub fn stall_receipts(&self) {
        self.state.lock().unwrap().stall = true;
    }

    /// Confirm `installHook` without touching the directory.
    pub fn ignore_installs(&self) {
        self.state.lock().unwrap().ignore_installs = true;
    }

    /// Data the hook at `flag` returns from `hookFunctionRead`.
    pub fn set_read_response(&self, flag: HookFlag, data: Bytes) {
        self.state.lock().unwrap().read_responses.insert(flag, data);
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    pub fn submission_count(&self) -> usize {
        self.state.lock().unwrap().submissions
    }

    /// `(flag, value, data)` of every applied `hookFunctionWrite`.
    pub fn routed_writes(&self) -> Vec<(HookFlag, U256, Bytes)> {
        self.state.lock().unwrap().routed_writes.clone()
    }

    /// `(to, quantity, encodedArgs)` of every applied `mint`.
    pub fn mints(&self) -> Vec<(Address, U256, Bytes)> {
        self.state.lock().unwrap().mints.clone()
    }
}

fn reverted(reason: &str) -> TransportError {
    TransportError::Reverted(reason.to_string())
}

fn returns(tag: TypeTag, value: DynSolValue) -> Bytes {
    abi::encode(&EncodingSpec::new(vec![tag]), &[value]).unwrap().into()
}

fn decode_args(signature: &str, calldata: &[u8]) -> Result<Vec<DynSolValue>, String> {
    FunctionCall::parse(signature)
        .unwrap()
        .decode(calldata)
        .map_err(|e| e.to_string())
}

fn as_flag(value: &DynSolValue) -> Option<HookFlag> {
    match value {
        DynSolValue::Uint(bits, _) => HookFlag::new(bits.saturating_to::<u64>()).ok(),
        _ => None,
    }
}

fn as_uint(value: &DynSolValue) -> U256 {
    match value {
        DynSolValue::Uint(v, _) => *v,
        _ => U256::ZERO,
    }
}

fn as_address(value: &DynSolValue) -> Address {
    match value {
        DynSolValue::Address(a) => *a,
        _ => Address::ZERO,
    }
}

fn as_bytes(value: &DynSolValue) -> Bytes {
    match value {
        DynSolValue::Bytes(b) => b.clone().into(),
        _ => Bytes::new(),
    }
}

impl State {
    fn read_core(&self, calldata: &[u8]) -> Result<Bytes, TransportError> {
        let selector = calldata.get(..4).unwrap_or_default();
        if selector == IHookedCore::getAllHooksCall::SELECTOR {
            let fields = DirectoryLayout::erc721()
                .flags()
                .iter()
                .map(|flag| DynSolValue::Address(self.slots.get(flag).copied().unwrap_or_default()))
                .collect();
            let tag = TypeTag::Tuple(vec![TypeTag::Address; 6]);
            return Ok(returns(tag, DynSolValue::Tuple(fields)));
        }
        if selector == IHookedCore::hookFunctionReadCall::SELECTOR {
            let args = decode_args("hookFunctionRead(uint256,bytes)", calldata).map_err(TransportError::Rpc)?;
            let flag = as_flag(&args[0]).ok_or_else(|| reverted("invalid flag"))?;
            if !self.slots.contains_key(&flag) {
                return Err(reverted("no hook installed"));
            }
            let data = self.read_responses.get(&flag).cloned().unwrap_or_default();
            return Ok(returns(TypeTag::Bytes, DynSolValue::Bytes(data.to_vec())));
        }
        Err(reverted("unknown selector"))
    }

    fn read_hook(&self, hook: Address, calldata: &[u8]) -> Result<Bytes, TransportError> {
        let registered = self.hooks.get(&hook).ok_or_else(|| reverted("no contract code"))?;
        let selector = calldata.get(..4).unwrap_or_default();
        if selector == registered.signature_selector {
            return Ok(returns(TypeTag::String, DynSolValue::String(registered.signature.clone())));
        }
        if selector == IHook::getHooksCall::SELECTOR {
            let bits = registered.flags.iter().fold(0u64, |acc, flag| acc | flag.bits());
            return Ok(returns(TypeTag::Uint(256), DynSolValue::Uint(U256::from(bits), 256)));
        }
        Err(reverted("function not implemented"))
    }

    /// Apply a mined transaction to core state.
    fn execute(&mut self, call: &PreparedCall) -> Result<(), String> {
        if call.to != MockCore::ADDRESS {
            return Ok(());
        }
        let calldata = call.calldata.as_ref();
        let selector = calldata.get(..4).unwrap_or_default();

        if selector == IHookedCore::installHookCall::SELECTOR {
            let hook = as_address(&decode_args("installHook(address)", calldata)?[0]);
            let flags = self
                .hooks
                .get(&hook)
                .map(|registered| registered.flags.clone())
                .ok_or_else(|| "hook reports no flags".to_string())?;
            if self.ignore_installs {
                return Ok(());
            }
            for flag in flags {
                self.slots.insert(flag, hook);
            }
            Ok(())
        } else if selector == IHookedCore::uninstallHookCall::SELECTOR {
            let hook = as_address(&decode_args("uninstallHook(address)", calldata)?[0]);
            let before = self.slots.len();
            self.slots.retain(|_, installed| *installed != hook);
            if self.slots.len() == before {
                return Err("hook not installed".to_string());
            }
            Ok(())
        } else if selector == IHookedCore::hookFunctionWriteCall::SELECTOR {
            let args = decode_args("hookFunctionWrite(uint256,uint256,bytes)", calldata)?;
            let flag = as_flag(&args[0]).ok_or_else(|| "invalid flag".to_string())?;
            if !self.slots.contains_key(&flag) {
                return Err("no hook installed".to_string());
            }
            self.routed_writes.push((flag, as_uint(&args[1]), as_bytes(&args[2])));
            Ok(())
        } else if selector == IHookedCore::mintCall::SELECTOR {
            let args = decode_args("mint(address,uint256,bytes)", calldata)?;
            let hook = self
                .slots
                .get(&HookFlag::BEFORE_MINT)
                .copied()
                .ok_or_else(|| "no beforeMint hook".to_string())?;
            let encoded_args = as_bytes(&args[2]);
            if let Some(spec) = self
                .hooks
                .get(&hook)
                .and_then(|registered| EncodingSpec::parse(&registered.signature).ok())
            {
                abi::decode(&spec, &encoded_args).map_err(|_| "invalid hook args".to_string())?;
            }
            self.mints.push((as_address(&args[0]), as_uint(&args[1]), encoded_args));
            Ok(())
        } else {
            Err("unknown selector".to_string())
        }
    }
}

#[async_trait]
impl Transport for MockCore {
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if let Some(message) = &state.read_failure {
            return Err(TransportError::Rpc(message.clone()));
        }
        if to == Self::ADDRESS {
            state.read_core(&calldata)
        } else {
            state.read_hook(to, &calldata)
        }
    }

    async fn submit(&self, call: PreparedCall) -> Result<SubmissionHandle, TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = &state.submit_rejection {
            return Err(reverted(reason));
        }
        state.submissions += 1;
        let block = state.submissions as u64;
        let tx_hash = keccak256(block.to_be_bytes());

        let result = match state.receipt_revert.clone() {
            Some(reason) => Err(reason),
            None => state.execute(&call),
        };
        let receipt = Receipt {
            tx_hash,
            success: result.is_ok(),
            block_number: Some(block),
            block_hash: Some(keccak256(tx_hash)),
            revert_reason: result.err(),
        };
        state.receipts.insert(tx_hash, receipt);
        Ok(SubmissionHandle { tx_hash, call })
    }

    async fn wait_for_receipt(&self, handle: &SubmissionHandle) -> Result<Receipt, TransportError> {
        let receipt = {
            let state = self.state.lock().unwrap();
            if state.stall {
                None
            } else {
                state.receipts.get(&handle.tx_hash).cloned()
            }
        };
        match receipt {
            Some(receipt) => Ok(receipt),
            None => std::future::pending().await,
        }
    }
}
