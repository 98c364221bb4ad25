//! JNI entry points exported by the library.
//!
//! The JVM resolves `BTraceRuntime.dtraceProbe0` to one of the
//! `Java_*_dtraceProbe0` symbols below, depending on which BTrace package
//! layout loaded us. Both forward to [`dtrace_probe0`] with the process-wide
//! sink.

use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{ProbeConfig, ProbeMode, DEFAULT_LOG_FILTER, LOG_ENV};
use crate::jni_wrapper::{JavaVm, JniEnv};
use crate::logging;
use crate::marshal::Marshaler;
use crate::probe::{DisabledProbe, ProbeSink};
use crate::sys::jni;

/// JNI version requested from and reported to the JVM.
pub const REQUIRED_JNI_VERSION: jni::jint = jni::JNI_VERSION_1_6;

// Holds the sink so the static JNI entry points can find it.
static PROBE: OnceLock<Box<dyn ProbeSink>> = OnceLock::new();

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a probe sink is already installed")]
    ProbeAlreadyInstalled,
}

/// Installs the sink every JNI call will fire.
///
/// Must happen before the first probe call (or `JNI_OnLoad`); after that
/// the sink configured from the environment is already in place.
pub fn install_probe(probe: Box<dyn ProbeSink>) -> Result<(), RegistryError> {
    PROBE
        .set(probe)
        .map_err(|_| RegistryError::ProbeAlreadyInstalled)
}

/// The process-wide sink, configured from the environment on first use.
pub fn installed_probe() -> &'static dyn ProbeSink {
    PROBE.get_or_init(|| configured_probe(&load_config())).as_ref()
}

fn load_config() -> ProbeConfig {
    match ProbeConfig::from_env() {
        Ok(config) => {
            logging::init_logging(&config.log_filter);
            config
        }
        Err(e) => {
            let filter = std::env::var(LOG_ENV).unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
            logging::init_logging(&filter);
            warn!(error = %e, "invalid probe configuration, probes disabled");
            ProbeConfig {
                mode: ProbeMode::Off,
                ..ProbeConfig::default()
            }
        }
    }
}

fn configured_probe(config: &ProbeConfig) -> Box<dyn ProbeSink> {
    match config.build_probe() {
        Ok(probe) => {
            info!(mode = %config.mode, "probe sink ready");
            probe
        }
        Err(e) => {
            warn!(mode = %config.mode, error = %e, "probe sink unavailable, probes disabled");
            Box::new(DisabledProbe)
        }
    }
}

fn non_null(s: jni::jstring) -> Option<jni::jstring> {
    if s.is_null() {
        None
    } else {
        Some(s)
    }
}

/// Body of the `dtraceProbe0` natives, with the sink passed in.
///
/// Null strings are absent arguments. Returns the probe's result, or 0 if a
/// string could not be converted or the sink panicked.
///
/// # Safety
///
/// `env` must be the current thread's JNI environment and `str1`/`str2`
/// must be null or valid `jstring` references.
pub unsafe fn dtrace_probe0<P: ProbeSink + ?Sized>(
    env: *mut jni::JNIEnv,
    probe: &P,
    str1: jni::jstring,
    str2: jni::jstring,
    i1: jni::jint,
    i2: jni::jint,
) -> jni::jint {
    dtrace_probe0_with(env, || probe, str1, str2, i1, i2)
}

/// Like [`dtrace_probe0`], but looks the sink up through `resolve`.
///
/// `resolve` runs inside the same panic boundary as the sink, so a sink
/// that fails to initialize also yields 0.
///
/// # Safety
///
/// Same contract as [`dtrace_probe0`].
pub unsafe fn dtrace_probe0_with<'p, P, F>(
    env: *mut jni::JNIEnv,
    resolve: F,
    str1: jni::jstring,
    str2: jni::jstring,
    i1: jni::jint,
    i2: jni::jint,
) -> jni::jint
where
    P: ProbeSink + ?Sized + 'p,
    F: FnOnce() -> &'p P,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let probe = resolve();
        let env = JniEnv::from_raw(env);
        Marshaler::new(&env, probe).invoke(non_null(str1), non_null(str2), i1, i2)
    }));

    match outcome {
        Ok(result) => result,
        Err(_) => {
            error!(i1, i2, "probe sink panicked, probe not recorded");
            0
        }
    }
}

/// `org.openjdk.btrace.core.BTraceRuntime.dtraceProbe0(String, String, int, int)`
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn Java_org_openjdk_btrace_core_BTraceRuntime_dtraceProbe0(
    env: *mut jni::JNIEnv,
    _cls: jni::jclass,
    str1: jni::jstring,
    str2: jni::jstring,
    i1: jni::jint,
    i2: jni::jint,
) -> jni::jint {
    dtrace_probe0_with(env, installed_probe, str1, str2, i1, i2)
}

/// `com.sun.btrace.BTraceRuntime.dtraceProbe0(String, String, int, int)`,
/// the pre-OpenJDK package layout.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn Java_com_sun_btrace_BTraceRuntime_dtraceProbe0(
    env: *mut jni::JNIEnv,
    _cls: jni::jclass,
    str1: jni::jstring,
    str2: jni::jstring,
    i1: jni::jint,
    i2: jni::jint,
) -> jni::jint {
    dtrace_probe0_with(env, installed_probe, str1, str2, i1, i2)
}

/// Called by the JVM when `System.loadLibrary("btrace")` loads us.
///
/// Sets up logging and the sink up front so the first probe call does not
/// pay for it.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "system" fn JNI_OnLoad(
    vm: *mut jni::JavaVM,
    _reserved: *mut c_void,
) -> jni::jint {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = installed_probe();
        if vm.is_null() {
            return;
        }
        let vm = JavaVm::from_raw(vm);
        match vm.get_env(REQUIRED_JNI_VERSION) {
            Ok(env) => debug!("loaded into JVM with JNI version {:#x}", env.get_version()),
            Err(code) => debug!(code, "no JNI environment on the loading thread"),
        }
    }));

    match outcome {
        Ok(()) => REQUIRED_JNI_VERSION,
        Err(_) => jni::JNI_ERR,
    }
}
