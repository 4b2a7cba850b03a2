//! Signal-guarded execution (spec.md §4.6). A [`Session`] owns the linked
//! memory region and arms process-wide signal handlers before calling into
//! JIT-compiled code, so a crash in the generated program returns a result
//! to the caller instead of taking down the host process.
//!
//! The handlers and the `setjmp`/`longjmp` pair are bound directly against
//! the platform libc via `extern "C"` — `libc` itself ships no safe
//! wrapper for non-local jumps (the contract is inherently unsafe), so
//! there is nothing an intermediate crate would add here.

use std::cell::Cell;
use std::ffi::c_int;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicI32, Ordering};

use log::{error, info};

use crate::error::JitError;
use crate::link::LinkResult;
use crate::memory::JitMemoryRegion;

/// Opaque, over-sized buffer for the platform's `sigjmp_buf`. Real size
/// varies by ABI (~192 bytes on aarch64 glibc including the signal mask);
/// 256 bytes with 16-byte alignment is comfortably larger on every target
/// this backend cares about.
#[repr(C, align(16))]
struct SigJmpBuf([u8; 256]);

impl SigJmpBuf {
    fn zeroed() -> SigJmpBuf {
        SigJmpBuf([0u8; 256])
    }
}

extern "C" {
    #[link_name = "sigsetjmp"]
    fn sigsetjmp_raw(env: *mut SigJmpBuf, savesigs: c_int) -> c_int;
    #[link_name = "siglongjmp"]
    fn siglongjmp_raw(env: *mut SigJmpBuf, val: c_int) -> !;
}

thread_local! {
    static JUMP_BUF: Cell<*mut SigJmpBuf> = Cell::new(std::ptr::null_mut());
}

static LAST_SIGNAL: AtomicI32 = AtomicI32::new(0);
static TIMED_OUT: AtomicI32 = AtomicI32::new(0);

const GUARDED_SIGNALS: &[c_int] =
    &[libc::SIGSEGV, libc::SIGBUS, libc::SIGILL, libc::SIGTRAP, libc::SIGABRT, libc::SIGFPE, libc::SIGALRM];

extern "C" fn handle_signal(signum: c_int) {
    if signum == libc::SIGALRM {
        TIMED_OUT.store(1, Ordering::SeqCst);
    }
    LAST_SIGNAL.store(signum, Ordering::SeqCst);
    let buf = JUMP_BUF.with(|cell| cell.get());
    if !buf.is_null() {
        unsafe { siglongjmp_raw(buf, 1) }
    }
    // No jump target installed: this signal arrived outside a guarded
    // call. Restore the default disposition and re-raise so the process
    // dies the normal way rather than looping.
    unsafe {
        libc::signal(signum, libc::SIG_DFL);
        libc::raise(signum);
    }
}

fn install_handlers() -> Result<(), JitError> {
    unsafe {
        for &sig in GUARDED_SIGNALS {
            let mut action: libc::sigaction = MaybeUninit::zeroed().assume_init();
            action.sa_sigaction = handle_signal as usize;
            libc::sigemptyset(&mut action.sa_mask);
            action.sa_flags = 0;
            if libc::sigaction(sig, &action, std::ptr::null_mut()) != 0 {
                return Err(JitError::SignalSetup(std::io::Error::last_os_error()));
            }
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub completed: bool,
    pub exit_code: i32,
    pub signal: Option<i32>,
    /// Set when `run`/`run_with_args` were cut short by the timeout alarm
    /// rather than returning on their own. Distinct from `completed` so a
    /// caller can never mistake a timeout for a normal exit (spec.md §6:
    /// timeout is its own outcome, exit code 124, not a success).
    pub timed_out: bool,
}

pub struct Session {
    region: JitMemoryRegion,
    link_result: LinkResult,
}

impl Session {
    pub fn new(region: JitMemoryRegion, link_result: LinkResult) -> Result<Session, JitError> {
        if !region.is_executable() {
            return Err(JitError::NotExecutable);
        }
        Ok(Session { region, link_result })
    }

    pub fn entry_offset(&self) -> u32 {
        self.link_result.entry_offset
    }

    /// Invokes the compiled `int main(void)`, guarded against any fatal
    /// signal and an optional timeout.
    pub fn run(&self, timeout: Option<std::time::Duration>) -> Result<ExecResult, JitError> {
        self.run_guarded(timeout, |entry| {
            let main_fn: extern "C" fn() -> i32 = unsafe { std::mem::transmute(entry) };
            main_fn()
        })
    }

    /// Invokes `int main(int, char**)`, forwarding `args` using the
    /// platform's standard ABI argv layout.
    pub fn run_with_args(&self, args: &[String], timeout: Option<std::time::Duration>) -> Result<ExecResult, JitError> {
        let c_args: Vec<std::ffi::CString> = args.iter().map(|a| std::ffi::CString::new(a.as_str()).unwrap()).collect();
        let mut argv: Vec<*const std::os::raw::c_char> = c_args.iter().map(|a| a.as_ptr()).collect();
        argv.push(std::ptr::null());
        let argc = args.len() as i32;

        self.run_guarded(timeout, move |entry| {
            let main_fn: extern "C" fn(i32, *const *const std::os::raw::c_char) -> i32 = unsafe { std::mem::transmute(entry) };
            main_fn(argc, argv.as_ptr())
        })
    }

    fn run_guarded(
        &self,
        timeout: Option<std::time::Duration>,
        call: impl FnOnce(*const ()) -> i32,
    ) -> Result<ExecResult, JitError> {
        install_handlers()?;
        LAST_SIGNAL.store(0, Ordering::SeqCst);
        TIMED_OUT.store(0, Ordering::SeqCst);

        let entry = self.region.entry_point(self.link_result.entry_offset)?;

        let mut buf = SigJmpBuf::zeroed();
        let jumped = unsafe { sigsetjmp_raw(&mut buf, 1) };

        if jumped != 0 {
            JUMP_BUF.with(|cell| cell.set(std::ptr::null_mut()));
            disarm_alarm();
            let signum = LAST_SIGNAL.load(Ordering::SeqCst);
            if TIMED_OUT.load(Ordering::SeqCst) != 0 {
                info!("JIT execution timed out");
                return Ok(ExecResult { completed: false, exit_code: 124, signal: None, timed_out: true });
            }
            error!("JIT execution caught signal {}", signum);
            return Ok(ExecResult { completed: false, exit_code: -1, signal: Some(signum), timed_out: false });
        }

        JUMP_BUF.with(|cell| cell.set(&mut buf as *mut SigJmpBuf));
        if let Some(timeout) = timeout {
            arm_alarm(timeout);
        }

        let exit_code = call(entry);

        disarm_alarm();
        JUMP_BUF.with(|cell| cell.set(std::ptr::null_mut()));
        Ok(ExecResult { completed: true, exit_code, signal: None, timed_out: false })
    }
}

fn arm_alarm(timeout: std::time::Duration) {
    let secs = timeout.as_secs().max(1) as libc::c_uint;
    unsafe {
        libc::alarm(secs);
    }
}

fn disarm_alarm() {
    unsafe {
        libc::alarm(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_result_default_is_not_completed() {
        let result = ExecResult::default();
        assert!(!result.completed);
        assert_eq!(result.signal, None);
        assert!(!result.timed_out);
    }

    #[test]
    fn a_timed_out_result_is_never_reported_as_completed() {
        let result = ExecResult { completed: false, exit_code: 124, signal: None, timed_out: true };
        assert!(result.timed_out);
        assert!(!result.completed, "a timeout must not be mistaken for a normal exit");
    }
}
