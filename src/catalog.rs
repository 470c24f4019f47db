use std::{collections::HashSet, error::Error, fmt};

use libc::c_long;

use crate::convention::Convention;

/// Pointer-mask bits. Bit *i* set means argument slot *i* carries a
/// guest-relative address that must be relocated before the kernel call.
pub const PTR1: u8 = 1 << 0;
pub const PTR2: u8 = 1 << 1;
pub const PTR3: u8 = 1 << 2;
pub const PTR4: u8 = 1 << 3;
pub const PTR5: u8 = 1 << 4;
pub const PTR6: u8 = 1 << 5;

/// One syscall the sandbox exposes to guests: the import name guests link
/// against, the host syscall number, and which argument slots hold pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallDesc {
    pub name: &'static str,
    pub number: c_long,
    pub ptr_mask: u8,
}

impl SyscallDesc {
    pub const fn new(name: &'static str, number: c_long, ptr_mask: u8) -> Self {
        SyscallDesc {
            name,
            number,
            ptr_mask,
        }
    }
}

/// The closed set of supported syscalls, in generation (and therefore
/// output) order. Constructed once; read-only afterwards.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<SyscallDesc>,
}

impl Catalog {
    pub fn from_entries(entries: Vec<SyscallDesc>) -> Self {
        Catalog { entries }
    }

    /// The built-in catalog. Ordering is load-bearing only for output
    /// reproducibility; the entries themselves are independent.
    pub fn builtin() -> Self {
        Self::from_entries(builtin_entries())
    }

    pub fn entries(&self) -> &[SyscallDesc] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check every entry against the catalog invariants: unique names,
    /// pointer-mask bits within the convention's slot range, and a syscall
    /// number that resolved on the target platform. Runs before anything is
    /// emitted; the first offending entry aborts generation.
    pub fn validate(&self, convention: &Convention) -> Result<(), CatalogError> {
        let slots = convention.slot_count();
        let mut seen = HashSet::new();

        for sc in &self.entries {
            if !seen.insert(sc.name) {
                return Err(CatalogError::DuplicateName { name: sc.name });
            }
            let excess = sc.ptr_mask & !legal_mask(slots);
            if excess != 0 {
                return Err(CatalogError::MaskBitOutOfRange {
                    name: sc.name,
                    bit: excess.trailing_zeros(),
                    slots,
                });
            }
            if sc.number < 0 {
                return Err(CatalogError::UnsupportedSyscall {
                    name: sc.name,
                    number: sc.number,
                });
            }
        }
        Ok(())
    }
}

fn legal_mask(slots: usize) -> u8 {
    if slots >= u8::BITS as usize {
        !0
    } else {
        (1u8 << slots) - 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    DuplicateName {
        name: &'static str,
    },
    MaskBitOutOfRange {
        name: &'static str,
        bit: u32,
        slots: usize,
    },
    UnsupportedSyscall {
        name: &'static str,
        number: c_long,
    },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::DuplicateName { name } => {
                write!(f, "duplicate syscall name {name:?} in catalog")
            }
            CatalogError::MaskBitOutOfRange { name, bit, slots } => {
                write!(
                    f,
                    "syscall {name:?} flags pointer argument {bit}, but the convention only has {slots} argument slots"
                )
            }
            CatalogError::UnsupportedSyscall { name, number } => {
                write!(
                    f,
                    "syscall {name:?} did not resolve to a usable number on this target (got {number})"
                )
            }
        }
    }
}

impl Error for CatalogError {}

fn builtin_entries() -> Vec<SyscallDesc> {
    vec![
        SyscallDesc::new("read", libc::SYS_read, PTR2),
        SyscallDesc::new("write", libc::SYS_write, PTR2),
        SyscallDesc::new("open", libc::SYS_open, PTR1),
        SyscallDesc::new("close", libc::SYS_close, 0),
        SyscallDesc::new("lseek", libc::SYS_lseek, 0),
        SyscallDesc::new("pread", libc::SYS_pread64, PTR2),
        SyscallDesc::new("pwrite", libc::SYS_pwrite64, PTR2),
        SyscallDesc::new("access", libc::SYS_access, PTR1),
        SyscallDesc::new("pipe", libc::SYS_pipe, PTR1),
        SyscallDesc::new("dup", libc::SYS_dup, 0),
        SyscallDesc::new("dup2", libc::SYS_dup2, 0),
        SyscallDesc::new("getpid", libc::SYS_getpid, 0),
        SyscallDesc::new("sendfile", libc::SYS_sendfile, PTR3),
        SyscallDesc::new("shutdown", libc::SYS_shutdown, 0),
        SyscallDesc::new("socketpair", libc::SYS_socketpair, PTR4),
        SyscallDesc::new("flock", libc::SYS_flock, 0),
        SyscallDesc::new("fsync", libc::SYS_fsync, 0),
        SyscallDesc::new("fdatasync", libc::SYS_fdatasync, 0),
        SyscallDesc::new("truncate", libc::SYS_truncate, PTR1),
        SyscallDesc::new("ftruncate", libc::SYS_ftruncate, 0),
        SyscallDesc::new("getcwd", libc::SYS_getcwd, PTR1),
        SyscallDesc::new("chdir", libc::SYS_chdir, PTR1),
        SyscallDesc::new("fchdir", libc::SYS_fchdir, 0),
        SyscallDesc::new("rename", libc::SYS_rename, PTR1 | PTR2),
        SyscallDesc::new("mkdir", libc::SYS_mkdir, PTR1),
        SyscallDesc::new("rmdir", libc::SYS_rmdir, PTR1),
        SyscallDesc::new("creat", libc::SYS_creat, PTR1),
        SyscallDesc::new("link", libc::SYS_link, PTR1 | PTR2),
        SyscallDesc::new("unlink", libc::SYS_unlink, PTR1),
        SyscallDesc::new("symlink", libc::SYS_symlink, PTR1 | PTR2),
        SyscallDesc::new("readlink", libc::SYS_readlink, PTR1 | PTR2),
        SyscallDesc::new("chmod", libc::SYS_chmod, PTR1),
        SyscallDesc::new("fchmod", libc::SYS_fchmod, 0),
        SyscallDesc::new("chown", libc::SYS_chown, PTR1),
        SyscallDesc::new("fchown", libc::SYS_fchown, 0),
        SyscallDesc::new("lchown", libc::SYS_lchown, PTR1),
        SyscallDesc::new("umask", libc::SYS_umask, 0),
        SyscallDesc::new("getuid", libc::SYS_getuid, 0),
        SyscallDesc::new("getgid", libc::SYS_getgid, 0),
        SyscallDesc::new("vhangup", libc::SYS_vhangup, 0),
        SyscallDesc::new("sync", libc::SYS_sync, 0),
        SyscallDesc::new("gettid", libc::SYS_gettid, 0),
        SyscallDesc::new("time", libc::SYS_time, PTR1),
        // posix_fadvise has no syscall of its own; the kernel entry is fadvise64.
        SyscallDesc::new("posix_fadvise", libc::SYS_fadvise64, 0),
        // _exit terminates the whole guest, so exit_group rather than exit.
        SyscallDesc::new("_exit", libc::SYS_exit_group, 0),
        SyscallDesc::new("inotify_init", libc::SYS_inotify_init, 0),
        SyscallDesc::new("inotify_add_watch", libc::SYS_inotify_add_watch, PTR2),
        SyscallDesc::new("inotify_rm_watch", libc::SYS_inotify_rm_watch, 0),
        SyscallDesc::new("openat", libc::SYS_openat, PTR2),
        SyscallDesc::new("mkdirat", libc::SYS_mkdirat, PTR2),
        SyscallDesc::new("fchownat", libc::SYS_fchownat, PTR2),
        SyscallDesc::new("unlinkat", libc::SYS_unlinkat, PTR2),
        SyscallDesc::new("renameat", libc::SYS_renameat, PTR2 | PTR4),
        SyscallDesc::new("linkat", libc::SYS_linkat, PTR2 | PTR4),
        SyscallDesc::new("symlinkat", libc::SYS_symlinkat, PTR1 | PTR3),
        SyscallDesc::new("readlinkat", libc::SYS_readlinkat, PTR2 | PTR3),
        SyscallDesc::new("fchmodat", libc::SYS_fchmodat, PTR2),
        SyscallDesc::new("faccessat", libc::SYS_faccessat, PTR2),
        SyscallDesc::new("splice", libc::SYS_splice, PTR2 | PTR4),
        SyscallDesc::new("tee", libc::SYS_tee, 0),
        SyscallDesc::new("sync_file_range", libc::SYS_sync_file_range, 0),
        SyscallDesc::new("fallocate", libc::SYS_fallocate, 0),
        // Guests only see the flag-less interface, so eventfd2 with flags=0.
        SyscallDesc::new("eventfd", libc::SYS_eventfd2, 0),
        SyscallDesc::new("dup3", libc::SYS_dup3, 0),
        SyscallDesc::new("pipe2", libc::SYS_pipe2, PTR1),
    ]
}
