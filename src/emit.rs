use std::{
    fmt::Write as _,
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{catalog::Catalog, convention::Convention, relocate::dispatch_body};

/// Declarations/registry artifact, consumed by the host runtime's build.
pub const IMPORTS_FILE: &str = "syscall_imports.rs";
/// Low-level stub artifact, assembled into the host runtime.
pub const STUBS_FILE: &str = "syscall_stubs.s";

const HEADER: &str = "Generated by trampgen. Do not edit.";

/// Global symbol of the entry stub for one syscall. Catalog names are
/// unique, so wrapping them keeps the mapping injective.
pub fn entry_symbol(name: &str) -> String {
    format!("sys_{name}_entry")
}

/// File-local symbol of the paired dispatch stub.
pub fn dispatch_symbol(name: &str) -> String {
    format!("sys_{name}_dispatch")
}

/// Render the declarations/registry artifact: one extern declaration per
/// entry stub, plus the function the host runtime calls once at
/// initialization to build the name-to-handle import table.
pub fn render_imports(catalog: &Catalog) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "// {HEADER}\n");
    out.push_str("use std::collections::HashMap;\n\n");

    out.push_str("unsafe extern \"C\" {\n");
    for sc in catalog.entries() {
        let _ = writeln!(out, "    fn {}() -> u64;", entry_symbol(sc.name));
    }
    out.push_str("}\n\n");

    out.push_str("/// Maps guest import names to opaque trampoline entry addresses.\n");
    out.push_str("/// Built once during host initialization; read-only afterwards.\n");
    out.push_str("pub fn build_import_table() -> HashMap<&'static str, u64> {\n");
    let _ = writeln!(
        out,
        "    let mut table = HashMap::with_capacity({});",
        catalog.len()
    );
    for sc in catalog.entries() {
        let _ = writeln!(
            out,
            "    table.insert({:?}, unsafe {{ {}() }});",
            sc.name,
            entry_symbol(sc.name)
        );
    }
    out.push_str("    table\n}\n");

    out
}

/// Render the stub artifact: per syscall, an entry stub that returns the
/// address of its dispatch stub, and the dispatch stub itself (argument
/// relocation, syscall-number load, jump to the shared kernel-call path).
pub fn render_stubs(catalog: &Catalog, convention: &Convention) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# {HEADER}\n");
    out.push_str("\t.text\n");

    for sc in catalog.entries() {
        let entry = entry_symbol(sc.name);
        let dispatch = dispatch_symbol(sc.name);
        debug!(
            "emitting {}: number {}, pointer mask {:#08b}",
            sc.name, sc.number, sc.ptr_mask
        );

        let _ = writeln!(out, "\n# {}", sc.name);
        let _ = writeln!(out, "\t.globl\t{entry}");
        let _ = writeln!(out, "{entry}:");
        let _ = writeln!(out, "\tleaq\t{dispatch}(%rip), %rax");
        out.push_str("\tret\n\n");

        let _ = writeln!(out, "{dispatch}:");
        for inst in dispatch_body(sc, convention) {
            let _ = writeln!(out, "{inst}");
        }
    }

    out
}

/// Validate the catalog, render both artifacts, and persist them into
/// `out_dir`. Nothing is written if validation fails, and each artifact is
/// renamed into place only after both temp files are fully written, so a
/// failed write leaves the previous artifacts intact rather than a truncated
/// or half-updated pair.
pub fn write_artifacts(out_dir: &Path, catalog: &Catalog, convention: &Convention) -> Result<()> {
    catalog.validate(convention)?;

    let imports = render_imports(catalog);
    let stubs = render_stubs(catalog, convention);

    let targets = [
        (out_dir.join(IMPORTS_FILE), imports),
        (out_dir.join(STUBS_FILE), stubs),
    ];

    let mut staged = Vec::new();
    for (path, contents) in &targets {
        let tmp = tmp_path(path);
        if let Err(err) = fs::write(&tmp, contents) {
            discard(&staged);
            return Err(err).with_context(|| format!("failed to write {}", tmp.display()));
        }
        staged.push(tmp);
    }

    for ((path, contents), tmp) in targets.iter().zip(&staged) {
        if let Err(err) = fs::rename(tmp, path) {
            discard(&staged);
            return Err(err).with_context(|| format!("failed to replace {}", path.display()));
        }
        info!("wrote {} ({} bytes)", path.display(), contents.len());
    }

    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

fn discard(staged: &[PathBuf]) {
    for tmp in staged {
        if let Err(err) = fs::remove_file(tmp)
            && err.kind() != io::ErrorKind::NotFound
        {
            debug!("failed to remove {}: {err}", tmp.display());
        }
    }
}
