//! QtTest executables: discovery, slot listing, and running
//!
//! [`QtTests`] holds the executables of a build directory. Each [`QtTest`] knows its slots (from
//! `-functions`), runs them with TAP and txt logs, and keeps the classified outcome of the last run on
//! each [`QtTestSlot`].

mod collection;
mod discovery;
mod executable;

pub use collection::QtTests;
pub use discovery::{CtestDiscovery, DirectoryScanDiscovery, DiscoveredExecutable, TestDiscovery};
pub use executable::{QtTest, QtTestSlot, RunReport, TestCommand};
