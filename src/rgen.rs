use alloy::sol;

// Abi Generation for the ERC20 subset we touch
sol!(
    #[derive(Debug, PartialEq, Eq)]
    contract IERC20 {
        function approve(address spender, uint256 value) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256 remaining);
    }
);

// Swap function signatures
sol!(
    #[derive(Debug, PartialEq, Eq)]
    contract IRouter {
        function swapExactTokensForTokens(
            uint256 amountIn,
            uint256 amountOutMin,
            address[] calldata path,
            address to,
            uint256 deadline
        ) external returns (uint256[] memory amounts);
    }
);
