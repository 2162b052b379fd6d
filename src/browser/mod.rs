pub mod automation;
pub mod chrome;
pub mod memory;
pub mod page;

pub use automation::{connect_to_chrome, CdpPage};
pub use memory::{MemoryElement, MemoryPage};
pub use page::{DomEvent, ElementRef, ElementState, FilePayload, InjectionCandidate, PageDriver};
