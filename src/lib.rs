//! # btrace-native
//!
//! Native half of the BTrace-to-DTrace channel.
//!
//! A BTrace script calls `BTraceUtils.D.probe(str1, str2, i1, i2)`; the JVM
//! dispatches that into `BTraceRuntime.dtraceProbe0`, which this library
//! implements. The two strings are borrowed from the JVM, turned into
//! native views, handed to a probe sink together with the two ints and a
//! result slot, and released again before the call returns.
//!
//! ## Features
//!
//! - **Leak-free marshaling**: string views are RAII guards, released exactly
//!   once on every exit path, including acquisition failures and panics
//! - **Pluggable sinks**: the probe is a [`ProbeSink`] trait object; closures,
//!   a `tracing` logger, a USDT probe or a dynamically loaded function
//! - **No exceptions leak into Java**: failures return 0
//!
//! ## Loading
//!
//! **1. Build the library:**
//! ```bash
//! cargo build --release --features usdt
//! ```
//!
//! **2. Make it loadable as `libbtrace`:**
//! ```bash
//! cp target/release/libbtrace_native.so $BTRACE_HOME/lib/libbtrace.so
//! ```
//!
//! **3. Pick the sink and watch it:**
//! ```bash
//! BTRACE_PROBE=sdt java -Djava.library.path=$BTRACE_HOME/lib ...
//! dtrace -p <pid> -n 'btrace$target:::event {
//!     printf("%s %s %d %d", copyinstr(arg0), copyinstr(arg1), arg2, arg3);
//! }'
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 JVM: BTraceRuntime.dtraceProbe0          │
//! ├─────────────────────────────────────────────────────────┤
//! │              Entry points (natives module)               │
//! │   Java_*_dtraceProbe0, JNI_OnLoad, install_probe         │
//! ├─────────────────────────────────────────────────────────┤
//! │                 Marshaling (marshal module)              │
//! │   Marshaler, TextView guard, ForeignStrings trait        │
//! ├──────────────────────────────┬──────────────────────────┤
//! │  jni_wrapper::JniEnv         │  probe::ProbeSink         │
//! │  (GetStringUTFChars/Release) │  Disabled/Tracing/Sdt/... │
//! ├──────────────────────────────┴──────────────────────────┤
//! │              Raw FFI Bindings (sys module)               │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`sys::jni`] | Raw JNI types and the function-table slots the bridge calls |
//! | [`jni_wrapper`] | `JniEnv` / `JavaVm` wrappers |
//! | [`marshal`] | Scoped acquisition of foreign strings and the marshaler |
//! | [`probe`] | Probe sinks |
//! | [`config`] | Environment configuration |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`natives`] | Exported JNI symbols |
//!
//! ## Driving the marshaler from Rust
//!
//! ```rust,ignore
//! use btrace_native::prelude::*;
//!
//! let env = unsafe { JniEnv::from_raw(env_ptr) };
//! let probe = |args: &ProbeArgs<'_>, result: &mut jni::jint| {
//!     *result = args.i1;
//! };
//! let code = unsafe { Marshaler::new(&env, &probe).invoke(Some(s1), None, 7, -1) };
//! ```

pub mod sys;
pub mod config;
pub mod jni_wrapper;
pub mod logging;
pub mod marshal;
pub mod natives;
pub mod prelude;
pub mod probe;

pub use crate::sys::jni;
pub use crate::marshal::{ForeignStrings, MarshalError, Marshaler, TextView};
pub use crate::natives::{install_probe, RegistryError};
pub use crate::probe::{ProbeArgs, ProbeSink};
