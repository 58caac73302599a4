//! Allocation bitmaps: extent maps, IAM chains and per-page PFS status.

mod chain;
mod page;
mod pfs;

pub use chain::AllocationChain;
pub use page::{
    AllocationPage, ALLOCATION_INTERVAL, FIRST_BCM_PAGE, FIRST_DCM_PAGE, FIRST_GAM_PAGE,
    FIRST_SGAM_PAGE,
};
pub use pfs::{PfsByte, PfsPage, SpaceFree, PFS_INTERVAL};
