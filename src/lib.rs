mod catalog;
mod convention;
mod emit;
mod relocate;

pub use catalog::{Catalog, CatalogError, PTR1, PTR2, PTR3, PTR4, PTR5, PTR6, SyscallDesc};
pub use convention::{ARG_SLOTS, Convention, Reg};
pub use emit::{IMPORTS_FILE, STUBS_FILE, render_imports, render_stubs, write_artifacts};
pub use relocate::{Inst, dispatch_body, relocation_sequence};
