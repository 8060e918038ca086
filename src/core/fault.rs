//! Translation of handler faults into `500` JSON responses.
//!
//! A handler fault is either an `Err` returned by the handler or a panic that
//! unwinds out of it. Both become a [`FaultReport`]:
//!
//! ```json
//! { "value": "<error display>", "trace": "<base64 trace>", "data": <diagnostics or null> }
//! ```
//!
//! A failing diagnostic callback is logged and the report goes out with
//! `data: null`. If the report itself cannot be written (headers already
//! committed by the handler, a failed body write) that is logged and dropped.
//! Nothing escapes [`invoke_handler`].
use std::{
    any::Any,
    backtrace::Backtrace,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use base64::{Engine, engine::general_purpose::STANDARD};
use eyre::{Result, WrapErr, eyre};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::core::{
    context::{Request, Response},
    router::Handler,
};

/// Return type of every route handler.
pub type HandlerResult = Result<()>;

/// Zero-argument callback whose value is attached to every fault report.
pub type DiagnosticFn = Arc<dyn Fn() -> Result<serde_json::Value> + Send + Sync>;

/// Body of a `500` response produced for a handler fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultReport {
    pub value: String,
    /// Base64 (standard alphabet, padded) of the raw trace text
    pub trace: String,
    pub data: serde_json::Value,
}

/// How a single handler invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Completed,
    /// The handler failed; `reported` is false when the 500 could not be written.
    Faulted { reported: bool },
}

struct Fault {
    value: String,
    trace: String,
}

impl Fault {
    fn from_report(report: &eyre::Report) -> Self {
        Self {
            value: report.to_string(),
            trace: format!("{report:?}"),
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = panic_message(payload.as_ref());
        Self {
            trace: format!("panicked: {message}\n{}", Backtrace::force_capture()),
            value: message,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Call `handler`, converting any fault into a `500` report on `response`.
pub(crate) fn invoke_handler(
    handler: &Handler,
    request: &Request,
    response: &mut Response<'_>,
    diagnostics: Option<&DiagnosticFn>,
) -> Invocation {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(request, response)));
    let fault = match outcome {
        Ok(Ok(())) => return Invocation::Completed,
        Ok(Err(report)) => Fault::from_report(&report),
        Err(payload) => Fault::from_panic(payload),
    };

    tracing::error!(
        http.method = %request.method(),
        http.path = request.path(),
        error = %fault.value,
        "Handler failed"
    );

    match report_fault(fault, response, diagnostics) {
        Ok(()) => Invocation::Faulted { reported: true },
        Err(e) => {
            tracing::error!(
                http.method = %request.method(),
                http.path = request.path(),
                error = ?e,
                "Failed to report handler fault; dropping it"
            );
            Invocation::Faulted { reported: false }
        }
    }
}

fn report_fault(
    fault: Fault,
    response: &mut Response<'_>,
    diagnostics: Option<&DiagnosticFn>,
) -> Result<()> {
    let data = match diagnostics.map(run_diagnostics) {
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            tracing::error!(error = ?e, "Diagnostic callback failed; reporting without data");
            serde_json::Value::Null
        }
        None => serde_json::Value::Null,
    };
    let report = FaultReport {
        value: fault.value,
        trace: STANDARD.encode(fault.trace.as_bytes()),
        data,
    };

    // Drop headers the handler staged but never sent.
    response.clear_headers();
    response
        .json(StatusCode::INTERNAL_SERVER_ERROR, &report)
        .wrap_err("Failed to write fault response")
}

fn run_diagnostics(callback: &DiagnosticFn) -> Result<serde_json::Value> {
    match panic::catch_unwind(AssertUnwindSafe(|| callback())) {
        Ok(value) => value.wrap_err("Diagnostic callback failed"),
        Err(payload) => Err(eyre!(
            "Diagnostic callback panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}
