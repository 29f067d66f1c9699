/*!
 * Process Signals
 * SIGCHLD self-pipe and SIGINT flag
 *
 * Signal handlers only touch atomics and write(2). All reaping and logging
 * happens on the `sigchld-reaper` thread woken through the pipe.
 */

use super::traits::ChildWatcher;
use super::types::{TopologyError, TopologyResult};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use parking_lot::Mutex;
use std::io::Read;
use std::os::unix::io::{AsRawFd, IntoRawFd};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Write end of the wake pipe, -1 when no reaper runs
static WAKE_FD: AtomicI32 = AtomicI32::new(-1);

/// Read end owned by the reaper thread; only forked children close it
static READ_FD: AtomicI32 = AtomicI32::new(-1);

static REAPER: Mutex<Option<JoinHandle<()>>> = parking_lot::const_mutex(None);

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigchld(_signal: libc::c_int) {
    let fd = WAKE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = 1u8;
        // SAFETY: write(2) is async-signal-safe; a full pipe just drops the wake-up
        unsafe {
            libc::write(fd, (&byte as *const u8).cast(), 1);
        }
    }
}

extern "C" fn on_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

fn install(signal: Signal, handler: SigHandler, flags: SaFlags) -> TopologyResult<()> {
    let action = SigAction::new(handler, flags, SigSet::empty());
    // SAFETY: the handlers above only use atomics and write(2)
    unsafe { sigaction(signal, &action) }
        .map(|_| ())
        .map_err(|e| TopologyError::SignalSetup(format!("{}: {}", signal, e)))
}

fn close_fd(fd: i32) {
    if fd >= 0 {
        // SAFETY: the descriptor was taken out of its atomic, nothing else closes it
        unsafe {
            libc::close(fd);
        }
    }
}

/// Restore default SIGCHLD handling and join the reaper thread
fn stop_reaper(thread: JoinHandle<()>) -> TopologyResult<()> {
    let reset = install(Signal::SIGCHLD, SigHandler::SigDfl, SaFlags::empty());
    READ_FD.store(-1, Ordering::Release);
    // EOF on the read end ends the reaper loop
    close_fd(WAKE_FD.swap(-1, Ordering::AcqRel));
    if thread.join().is_err() {
        warn!("SIGCHLD reaper thread panicked");
    }
    reset
}

/// Install the SIGCHLD handler and start the reaper thread
///
/// A reaper that is already running is stopped first and `watcher` takes
/// its place.
pub fn install_child_watcher(watcher: ChildWatcher) -> TopologyResult<()> {
    let mut reaper = REAPER.lock();
    if let Some(previous) = reaper.take() {
        debug!("Replacing SIGCHLD reaper");
        stop_reaper(previous)?;
    }

    let (mut reader, writer) =
        UnixStream::pair().map_err(|e| TopologyError::SignalSetup(e.to_string()))?;
    writer
        .set_nonblocking(true)
        .map_err(|e| TopologyError::SignalSetup(e.to_string()))?;
    READ_FD.store(reader.as_raw_fd(), Ordering::Release);

    let spawned = std::thread::Builder::new()
        .name("sigchld-reaper".to_string())
        .spawn(move || {
            let mut buffer = [0u8; 64];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(_) => watcher(),
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!(error = %e, "SIGCHLD wake pipe failed, reaper stopping");
                        break;
                    }
                }
            }
        });
    let thread = match spawned {
        Ok(thread) => thread,
        Err(e) => {
            READ_FD.store(-1, Ordering::Release);
            return Err(TopologyError::SignalSetup(e.to_string()));
        }
    };

    WAKE_FD.store(writer.into_raw_fd(), Ordering::Release);
    *reaper = Some(thread);
    install(
        Signal::SIGCHLD,
        SigHandler::Handler(on_sigchld),
        SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
    )?;
    debug!("SIGCHLD reaper installed");
    Ok(())
}

/// Stop the reaper thread and restore default SIGCHLD handling
pub fn remove_child_watcher() -> TopologyResult<()> {
    let Some(thread) = REAPER.lock().take() else {
        return Ok(());
    };
    stop_reaper(thread)?;
    debug!("SIGCHLD reaper removed");
    Ok(())
}

/// In a forked child: leave reaping to the parent
///
/// The reaper thread does not exist in the child, so its pipe is closed and
/// its handle forgotten without joining.
pub fn reset_child_signals() -> TopologyResult<()> {
    close_fd(WAKE_FD.swap(-1, Ordering::AcqRel));
    close_fd(READ_FD.swap(-1, Ordering::AcqRel));
    if let Some(mut reaper) = REAPER.try_lock() {
        std::mem::forget(reaper.take());
    }
    install(Signal::SIGCHLD, SigHandler::SigIgn, SaFlags::empty())
}

/// Turn SIGINT into a flag checked between events
pub fn install_interrupt_handler() -> TopologyResult<()> {
    install(Signal::SIGINT, SigHandler::Handler(on_sigint), SaFlags::SA_RESTART)
}

/// Whether SIGINT was received since the last `clear_interrupted`
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

pub fn clear_interrupted() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}
