//! Enforcement pack: custom lints for cas-core.
//!
//! Ticket values and passwords must only reach logs in redacted form, so
//! every diagnostic goes through `tracing` (directly or via `RequestLog`).
//!
//! ## Implemented Lints
//!
//! - `NO_PRINTLN`: Forbids println!, eprintln!, and dbg! macros in library code.

#![feature(rustc_private)]
#![warn(unused_extern_crates)]

extern crate rustc_ast;
extern crate rustc_lint;
extern crate rustc_session;
extern crate rustc_span;

use rustc_ast::{Expr, ExprKind, MacCall};
use rustc_lint::{EarlyContext, EarlyLintPass};
use rustc_session::{declare_lint_pass, declare_tool_lint};

declare_tool_lint! {
    /// **What it does:** Forbids use of `println!`, `eprintln!`, and `dbg!` macros in library code.
    ///
    /// **Why is this bad?** These macros write straight to stdout/stderr:
    /// - Nothing redacts the ticket values or passwords they print
    /// - Their output has no level, target, or `request_id`
    /// - Security events printed this way never reach the `cas_security` target
    ///
    /// **Known problems:** None.
    ///
    /// **Example:**
    /// ```rust,ignore
    /// // Bad: prints the full ticket value
    /// println!("validated {}", ticket);
    /// eprintln!("store failure: {}", err);
    /// dbg!(&password);
    ///
    /// // Good
    /// tracing::debug!(ticket = %ticket.redacted(), "validated");
    /// let log = cas_core::RequestLog::new("req-1");
    /// log.error(format_args!("store failure: {err}"));
    /// ```
    pub enforcement_pack::NO_PRINTLN,
    Deny,
    "use of println!, eprintln!, or dbg! macros; use tracing or RequestLog instead"
}

declare_lint_pass!(NoPrintln => [NO_PRINTLN]);

impl EarlyLintPass for NoPrintln {
    fn check_expr(&mut self, cx: &EarlyContext<'_>, expr: &Expr) {
        if let ExprKind::MacCall(mac) = &expr.kind {
            check_macro(cx, mac, expr.span);
        }
    }
}

fn check_macro(cx: &EarlyContext<'_>, mac: &MacCall, span: rustc_span::Span) {
    let path = &mac.path;

    // Check if this is a single-segment macro call (println, eprintln, dbg)
    if path.segments.len() != 1 {
        return;
    }

    let macro_name = path.segments[0].ident.name.as_str();

    match macro_name {
        "println" => {
            rustc_lint::LintContext::span_lint(cx, NO_PRINTLN, span, |diag| {
                diag.help("use `tracing::info!` or `RequestLog` for structured logging");
                diag.note("`println!` skips ticket redaction and log routing");
            });
        }
        "eprintln" => {
            rustc_lint::LintContext::span_lint(cx, NO_PRINTLN, span, |diag| {
                diag.help("use `tracing::error!` or `RequestLog` for structured logging");
                diag.note("`eprintln!` skips ticket redaction and log routing");
            });
        }
        "dbg" => {
            rustc_lint::LintContext::span_lint(cx, NO_PRINTLN, span, |diag| {
                diag.help("use `tracing::debug!` or `RequestLog` for structured logging");
                diag.note("`dbg!` skips ticket redaction and log routing");
            });
        }
        _ => {}
    }
}

#[unsafe(no_mangle)]
#[allow(unsafe_code)]
pub extern "C" fn register_lints(_sess: &rustc_session::Session, lint_store: &mut rustc_lint::LintStore) {
    lint_store.register_lints(&[&NO_PRINTLN]);
    lint_store.register_early_pass(|| Box::new(NoPrintln));
}

#[unsafe(no_mangle)]
pub fn dylint_version() -> *mut std::os::raw::c_char {
    std::ffi::CString::new(dylint_linting::DYLINT_VERSION)
        .expect("version string contains null byte")
        .into_raw()
}
