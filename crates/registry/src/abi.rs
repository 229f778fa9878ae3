//! Solidity interface of the voting contract's registry.

use alloy_sol_types::sol;

sol! {
    /// Emitted once per registered voter commitment.
    event Registered(uint256 commitment, uint256 index);

    function getRoot() external view returns (uint256 root);

    /// Rolling history of recent roots.
    function roots(uint256 index) external view returns (uint256 root);
}
