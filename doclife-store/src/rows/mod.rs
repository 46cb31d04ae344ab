// SPDX-License-Identifier: MIT OR Apache-2.0

#[cfg(feature = "memory")]
mod memory;
#[cfg(all(test, feature = "memory"))]
mod tests;
mod traits;

pub use traits::RowStore;
