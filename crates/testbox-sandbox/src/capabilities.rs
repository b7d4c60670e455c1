//! Host bindings stripped from the sandbox's global scope
//!
//! The engine boots with a few globals that reach back into the host
//! (the `Deno` op bridge, timers, a console that prints to our stdout).
//! Caller code gets none of them. The set is data so tests can see
//! exactly what is removed.

use std::collections::BTreeSet;

/// A group of globals that would give sandboxed code a host capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HostBinding {
    /// `Deno` / `__bootstrap`: direct access to engine ops
    EngineBridge,
    /// Timer and scheduling functions
    Timers,
    /// `console`: replaced with a silent stand-in instead of deleted
    Console,
}

impl HostBinding {
    pub const ALL: [HostBinding; 3] = [
        HostBinding::EngineBridge,
        HostBinding::Timers,
        HostBinding::Console,
    ];

    /// Global names covered by this binding
    pub fn globals(self) -> &'static [&'static str] {
        match self {
            HostBinding::EngineBridge => &["Deno", "__bootstrap"],
            HostBinding::Timers => &[
                "setTimeout",
                "setInterval",
                "setImmediate",
                "clearTimeout",
                "clearInterval",
                "clearImmediate",
                "queueMicrotask",
            ],
            HostBinding::Console => &["console"],
        }
    }
}

/// The set of host bindings to neutralise before caller code runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalSurface {
    stripped: BTreeSet<HostBinding>,
}

impl GlobalSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every known host binding stripped
    pub fn locked_down() -> Self {
        let mut surface = Self::new();
        for binding in HostBinding::ALL {
            surface.strip(binding);
        }
        surface
    }

    pub fn strip(&mut self, binding: HostBinding) -> &mut Self {
        self.stripped.insert(binding);
        self
    }

    pub fn strips(&self, binding: HostBinding) -> bool {
        self.stripped.contains(&binding)
    }

    /// Render the JS that removes the stripped globals
    pub fn prelude(&self) -> String {
        let mut removed = Vec::new();
        for binding in &self.stripped {
            if *binding == HostBinding::Console {
                continue;
            }
            removed.extend(binding.globals().iter().map(|name| format!("{:?}", name)));
        }

        let mut js = String::from("(() => {\n  const g = globalThis;\n");
        js.push_str(&format!("  const removed = [{}];\n", removed.join(", ")));
        js.push_str(
            r#"  for (let i = 0; i < removed.length; i++) {
    const key = removed[i];
    try { delete g[key]; } catch (_) {}
    if (key in g) {
      try {
        Object.defineProperty(g, key, { value: undefined, writable: false, configurable: false });
      } catch (_) {}
    }
  }
"#,
        );
        if self.strips(HostBinding::Console) {
            js.push_str(
                r#"  const silent = () => undefined;
  const quiet = Object.create(null);
  const methods = ["log", "info", "warn", "error", "debug", "trace", "dir", "table", "assert", "group", "groupEnd", "time", "timeEnd", "count"];
  for (let i = 0; i < methods.length; i++) quiet[methods[i]] = silent;
  Object.defineProperty(g, "console", { value: Object.freeze(quiet), writable: true, configurable: true, enumerable: false });
"#,
            );
        }
        js.push_str("})();\n");
        js
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_down_strips_everything() {
        let surface = GlobalSurface::locked_down();
        for binding in HostBinding::ALL {
            assert!(surface.strips(binding));
        }
    }

    #[test]
    fn test_prelude_lists_removed_globals() {
        let prelude = GlobalSurface::locked_down().prelude();
        assert!(prelude.contains("\"Deno\""));
        assert!(prelude.contains("\"setTimeout\""));
        assert!(prelude.contains("\"queueMicrotask\""));
        // console is silenced, not deleted
        assert!(!prelude.contains("\"console\","));
        assert!(prelude.contains("Object.defineProperty(g, \"console\""));
    }

    #[test]
    fn test_empty_surface_removes_nothing() {
        let prelude = GlobalSurface::new().prelude();
        assert!(prelude.contains("const removed = [];"));
        assert!(!prelude.contains("console"));
    }
}
