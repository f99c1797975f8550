//! Timer shim for languages without timer primitives in the sandbox
//!
//! Timers are synchronous: `setTimeout` busy-waits until its deadline and
//! then runs the callback before returning. `setInterval` re-arms itself
//! after every wait until `clearInterval` is called for it. Because the
//! interval id is only returned once the interval stops, `clearInterval()`
//! without an id clears the innermost running interval.

use tracing::{debug, warn};

use crate::engine::EngineContext;
use crate::error::ScriptError;

/// Full polyfill
pub const TIMER_SHIM: &str = r#"
(function () {
    var nextId = 0;
    var active = {};
    var running = [];

    function waitThenRun(callback, delay) {
        var deadline = Date.now() + (delay || 0);
        while (Date.now() < deadline) {
        }
        if (typeof callback === 'function') {
            callback();
        }
    }

    globalThis.setTimeout = function (callback, delay) {
        var id = ++nextId;
        try {
            waitThenRun(callback, delay);
        } catch (e) {
            console.error('setTimeout callback error:', (e && e.message) || e);
        }
        return id;
    };

    globalThis.clearTimeout = function (id) {
        delete active[id];
    };

    globalThis.setInterval = function (callback, delay) {
        var id = ++nextId;
        active[id] = true;
        var tick = function () {
            running.push(id);
            while (active[id]) {
                try {
                    waitThenRun(function () {
                        if (active[id]) {
                            callback();
                        }
                    }, delay);
                } catch (e) {
                    console.error('setInterval callback error:', (e && e.message) || e);
                    delete active[id];
                }
            }
            running.pop();
        };
        tick();
        return id;
    };

    globalThis.clearInterval = function (id) {
        if (id === undefined && running.length > 0) {
            id = running[running.length - 1];
        }
        delete active[id];
    };
})();
"#;

/// Busy wait only; cancellation is a no-op
pub const FALLBACK_TIMER_SHIM: &str = r#"
globalThis.setTimeout = function (callback, delay) {
    var start = Date.now();
    while (Date.now() - start < (delay || 0)) {
    }
    if (typeof callback === 'function') {
        callback();
    }
    return 0;
};
globalThis.clearTimeout = function (id) {};
"#;

/// Which shim ended up installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShimOutcome {
    Full,
    Fallback,
    Skipped,
}

/// Install the timer shim into `ctx`.
///
/// Never fails: errors degrade to the fallback shim, then to no shim.
pub fn inject_timer_shim(ctx: &mut dyn EngineContext, language: &str) -> ShimOutcome {
    inject_with(ctx, language, TIMER_SHIM, FALLBACK_TIMER_SHIM)
}

fn inject_with(
    ctx: &mut dyn EngineContext,
    language: &str,
    full: &str,
    fallback: &str,
) -> ShimOutcome {
    let err = match ctx.eval(language, full) {
        Ok(_) => {
            debug!("Timer shim installed for {}", language);
            return ShimOutcome::Full;
        }
        Err(e) => ScriptError::ShimInjection(e.to_string()),
    };

    warn!("{} ({}). Trying fallback shim", err, language);

    match ctx.eval(language, fallback) {
        Ok(_) => ShimOutcome::Fallback,
        Err(e) => {
            let err = ScriptError::ShimInjection(e.to_string());
            warn!("{} ({}). Continuing without timers", err, language);
            ShimOutcome::Skipped
        }
    }
}
