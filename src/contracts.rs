//! Solidity bindings for the external contract surface.
//!
//! The core contract and its hooks are deployed and owned elsewhere; these bindings
//! only fix the selectors and argument layouts this client speaks.

use alloy::sol;

sol! {
    /// Hook-consuming ERC-721 core.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IHookedCore {
        struct ERC721Hooks {
            address beforeMint;
            address beforeTransfer;
            address beforeBurn;
            address beforeApprove;
            address tokenURI;
            address royaltyInfo;
        }

        function getAllHooks() external view returns (ERC721Hooks memory hooks);
        function installHook(address hook) external;
        function uninstallHook(address hook) external;
        function hookFunctionWrite(uint256 hookFlag, uint256 value, bytes data) external payable returns (bytes memory);
        function hookFunctionRead(uint256 hookFlag, bytes data) external view returns (bytes memory);
        function mint(address to, uint256 quantity, bytes encodedArgs) external payable;
    }
}

sol! {
    /// Self-description surface every hook publishes.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IHook {
        function getHooks() external view returns (uint256 hooksImplemented);
        function getBeforeMintArgSignature() external view returns (string memory argSignature);
    }
}

sol! {
    /// Metadata hook, routed under the tokenURI flag.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface ILazyMint {
        function lazyMint(uint256 amount, string baseURIForTokens, bytes data) external returns (uint256 batchId);
    }
}

sol! {
    /// Royalty hook, routed under the royaltyInfo flag.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IRoyalty {
        function setDefaultRoyaltyInfo(address royaltyRecipient, uint256 royaltyBps) external;
    }
}
