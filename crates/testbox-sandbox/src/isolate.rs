//! V8 sandbox backed by `deno_core`
//!
//! Each sandbox is a fresh isolate. The memory ceiling is enforced by V8
//! itself plus a near-heap-limit callback that terminates execution, and by
//! a counting ArrayBuffer allocator for off-heap backing stores. The
//! wall-clock budget is enforced by a watchdog thread holding a thread-safe
//! isolate handle.
//!
//! V8 isolates are `!Send`: a `V8Sandbox` must be created, used and dropped
//! on the same thread.

use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::Duration;

use deno_core::{v8, JsRuntime, RuntimeOptions};

use crate::capabilities::GlobalSurface;
use crate::engine::{Sandbox, SandboxFactory};
use crate::{Result, SandboxError, SandboxLimits};

/// Headroom granted past the ceiling so the termination can unwind
const HEAP_GRACE_BYTES: usize = 4 * 1024 * 1024;

const HARDEN_LABEL: &str = "[testbox:harden]";

/// Factory for V8 sandboxes. V8's platform is process-wide; this is the
/// only place that touches it.
#[derive(Debug, Clone)]
pub struct V8SandboxFactory {
    surface: GlobalSurface,
}

impl V8SandboxFactory {
    pub fn new() -> Self {
        Self {
            surface: GlobalSurface::locked_down(),
        }
    }
}

impl Default for V8SandboxFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxFactory for V8SandboxFactory {
    fn name(&self) -> &'static str {
        "v8"
    }

    fn create(&self, limits: &SandboxLimits) -> Result<Box<dyn Sandbox>> {
        Ok(Box::new(V8Sandbox::new(limits, &self.surface)?))
    }
}

/// Memory accounting shared by the near-heap-limit callback and the
/// ArrayBuffer allocator. Backing stores live outside the V8 heap, so they
/// are charged here against the same ceiling.
struct MemoryBudget {
    limit: usize,
    used: AtomicUsize,
    exceeded: AtomicBool,
    isolate: OnceLock<v8::IsolateHandle>,
}

impl MemoryBudget {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
            exceeded: AtomicBool::new(false),
            isolate: OnceLock::new(),
        }
    }

    /// Charge `bytes` of off-heap memory; refuses past the ceiling
    fn reserve(&self, bytes: usize) -> bool {
        let mut current = self.used.load(Ordering::SeqCst);
        loop {
            let next = match current.checked_add(bytes) {
                Some(next) if next <= self.limit => next,
                _ => {
                    self.overrun();
                    return false;
                }
            };
            match self
                .used
                .compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self, bytes: usize) {
        self.used.fetch_sub(bytes, Ordering::SeqCst);
    }

    /// Flag the overrun and stop the script at the first one
    fn overrun(&self) {
        if !self.exceeded.swap(true, Ordering::SeqCst) {
            if let Some(handle) = self.isolate.get() {
                handle.terminate_execution();
            }
        }
    }

    fn exceeded(&self) -> bool {
        self.exceeded.load(Ordering::SeqCst)
    }
}

extern "C" fn near_heap_limit_callback(
    data: *mut c_void,
    current_heap_limit: usize,
    _initial_heap_limit: usize,
) -> usize {
    // SAFETY: `data` comes from `Arc::as_ptr` on the budget held by the
    // `V8Sandbox`, which removes this callback and drops the isolate before
    // releasing its reference.
    let budget = unsafe { &*(data as *const MemoryBudget) };
    budget.overrun();
    current_heap_limit + HEAP_GRACE_BYTES
}

fn into_raw_buffer(buffer: Vec<u8>) -> *mut c_void {
    Box::into_raw(buffer.into_boxed_slice()) as *mut u8 as *mut c_void
}

/// # Safety
/// `data` and `len` must describe a buffer returned by this allocator.
unsafe fn from_raw_buffer(data: *mut c_void, len: usize) -> Box<[u8]> {
    Box::from_raw(std::ptr::slice_from_raw_parts_mut(data as *mut u8, len))
}

unsafe extern "C" fn budget_allocate(budget: &MemoryBudget, len: usize) -> *mut c_void {
    if !budget.reserve(len) {
        return std::ptr::null_mut();
    }
    into_raw_buffer(vec![0; len])
}

unsafe extern "C" fn budget_free(budget: &MemoryBudget, data: *mut c_void, len: usize) {
    budget.release(len);
    drop(from_raw_buffer(data, len));
}

unsafe extern "C" fn budget_reallocate(
    budget: &MemoryBudget,
    data: *mut c_void,
    old_length: usize,
    new_length: usize,
) -> *mut c_void {
    if new_length > old_length && !budget.reserve(new_length - old_length) {
        return std::ptr::null_mut();
    }
    if new_length < old_length {
        budget.release(old_length - new_length);
    }
    let mut buffer = Vec::from(from_raw_buffer(data, old_length));
    buffer.resize(new_length, 0);
    into_raw_buffer(buffer)
}

unsafe extern "C" fn budget_drop(budget: *const MemoryBudget) {
    drop(Arc::from_raw(budget));
}

static BUDGET_ALLOCATOR: v8::RustAllocatorVtable<MemoryBudget> = v8::RustAllocatorVtable {
    allocate: budget_allocate,
    allocate_uninitialized: budget_allocate,
    free: budget_free,
    reallocate: budget_reallocate,
    drop: budget_drop,
};

/// Terminates the isolate once the budget elapses unless cancelled first
struct Watchdog {
    cancel: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    fired: Arc<AtomicBool>,
}

impl Watchdog {
    fn spawn(handle: v8::IsolateHandle, timeout: Duration) -> Result<Self> {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let (cancel, cancelled) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("testbox-watchdog".to_string())
            .spawn(move || {
                if let Err(mpsc::RecvTimeoutError::Timeout) = cancelled.recv_timeout(timeout) {
                    flag.store(true, Ordering::SeqCst);
                    handle.terminate_execution();
                }
            })
            .map_err(|e| SandboxError::Unavailable(format!("failed to spawn watchdog: {}", e)))?;

        Ok(Self {
            cancel: Some(cancel),
            thread: Some(thread),
            fired,
        })
    }

    fn fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        // Dropping the sender wakes the watchdog with `Disconnected`.
        drop(self.cancel.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("sandbox watchdog thread panicked");
            }
        }
    }
}

/// A single-use V8 isolate.
///
/// Field order is drop order: the watchdog is joined before the isolate
/// goes away, and the budget outlives the isolate.
pub struct V8Sandbox {
    watchdog: Watchdog,
    runtime: JsRuntime,
    budget: Arc<MemoryBudget>,
    limits: SandboxLimits,
}

impl V8Sandbox {
    pub fn new(limits: &SandboxLimits, surface: &GlobalSurface) -> Result<Self> {
        let budget = Arc::new(MemoryBudget::new(limits.memory_limit_bytes));
        // SAFETY: the allocator owns one strong reference, given back in `budget_drop`.
        let allocator = unsafe {
            v8::new_rust_allocator(Arc::into_raw(budget.clone()), &BUDGET_ALLOCATOR)
        };
        let create_params = v8::CreateParams::default()
            .heap_limits(0, limits.memory_limit_bytes)
            .array_buffer_allocator(allocator.make_shared());
        let mut runtime = JsRuntime::new(RuntimeOptions {
            create_params: Some(create_params),
            ..Default::default()
        });

        let _ = budget.isolate.set(runtime.v8_isolate().thread_safe_handle());
        let watchdog = Watchdog::spawn(runtime.v8_isolate().thread_safe_handle(), limits.timeout)?;

        runtime.v8_isolate().add_near_heap_limit_callback(
            near_heap_limit_callback,
            Arc::as_ptr(&budget) as *mut c_void,
        );

        let mut sandbox = Self {
            watchdog,
            runtime,
            budget,
            limits: limits.clone(),
        };

        sandbox
            .eval(HARDEN_LABEL, &surface.prelude())
            .map_err(|e| match e {
                SandboxError::Script { message } => {
                    SandboxError::Unavailable(format!("hardening prelude failed: {}", message))
                }
                other => other,
            })?;

        Ok(sandbox)
    }

    fn execute(&mut self, label: &'static str, source: &str) -> Result<v8::Global<v8::Value>> {
        self.runtime
            .execute_script(label, source.to_owned())
            .map_err(|e| self.classify(&e.to_string()))
    }

    /// A ceiling explains the failure before the script does: a terminated
    /// isolate reports a generic "execution terminated" exception.
    fn classify(&self, raw: &str) -> SandboxError {
        if self.budget.exceeded() {
            SandboxError::ResourceExceeded {
                limit_bytes: self.limits.memory_limit_bytes,
            }
        } else if self.watchdog.fired() {
            SandboxError::TimedOut {
                timeout_ms: self.limits.timeout_ms(),
            }
        } else {
            SandboxError::Script {
                message: exception_message(raw),
            }
        }
    }
}

impl Sandbox for V8Sandbox {
    fn eval(&mut self, label: &'static str, source: &str) -> Result<()> {
        self.execute(label, source).map(|_| ())
    }

    fn eval_string(&mut self, label: &'static str, source: &str) -> Result<String> {
        let value = self.execute(label, source)?;
        let scope = &mut self.runtime.handle_scope();
        let local = v8::Local::new(scope, value);
        if !local.is_string() {
            return Err(SandboxError::Script {
                message: format!("{} produced a non-string value", label),
            });
        }
        Ok(local.to_rust_string_lossy(scope))
    }
}

impl Drop for V8Sandbox {
    fn drop(&mut self) {
        self.runtime
            .v8_isolate()
            .remove_near_heap_limit_callback(near_heap_limit_callback, 0);
    }
}

/// First line of the engine's error text, without the "Uncaught " prefix
fn exception_message(raw: &str) -> String {
    let first = raw.lines().next().unwrap_or("").trim();
    let first = first.strip_prefix("Uncaught ").unwrap_or(first);
    if first.is_empty() {
        "unknown error".to_string()
    } else {
        first.to_string()
    }
}
