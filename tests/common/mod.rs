#![allow(dead_code)]

use std::cell::RefCell;
use std::ffi::{c_void, CStr, CString};
use std::os::raw::c_char;
use std::ptr::{self, NonNull};
use std::sync::{Arc, Mutex};

use btrace_native::jni;
use btrace_native::marshal::ForeignStrings;
use btrace_native::probe::{ProbeArgs, ProbeSink};
use btrace_native::sys::jni::{JNIInvokeInterface_, JNINativeInterface_};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Acquired(usize),
    AcquireFailed(usize),
    FailureHandled,
    Released(usize),
    Fired {
        first: Option<String>,
        second: Option<String>,
        i1: jni::jint,
        i2: jni::jint,
    },
}

/// Ordered log shared by the fake runtime and the recording probe.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    pub fn releases(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Released(h) => Some(h),
                _ => None,
            })
            .collect()
    }

    pub fn fired(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::Fired { .. }))
            .collect()
    }
}

/// Foreign string runtime whose handles are indices into a table.
pub struct FakeStrings {
    texts: Vec<CString>,
    failing: Vec<bool>,
    journal: Journal,
}

impl FakeStrings {
    pub fn new(journal: &Journal) -> Self {
        FakeStrings {
            texts: Vec::new(),
            failing: Vec::new(),
            journal: journal.clone(),
        }
    }

    pub fn add(&mut self, text: &str) -> usize {
        self.texts.push(CString::new(text).unwrap());
        self.failing.push(false);
        self.texts.len() - 1
    }

    /// Registers a handle whose acquisition always fails.
    pub fn add_failing(&mut self, text: &str) -> usize {
        let handle = self.add(text);
        self.failing[handle] = true;
        handle
    }
}

impl ForeignStrings for FakeStrings {
    type Handle = usize;

    unsafe fn acquire(&self, handle: usize) -> Option<NonNull<c_char>> {
        if self.failing[handle] {
            self.journal.push(Event::AcquireFailed(handle));
            return None;
        }
        self.journal.push(Event::Acquired(handle));
        NonNull::new(self.texts[handle].as_ptr() as *mut c_char)
    }

    unsafe fn release(&self, handle: usize, chars: NonNull<c_char>) {
        assert_eq!(chars.as_ptr() as *const c_char, self.texts[handle].as_ptr());
        self.journal.push(Event::Released(handle));
    }

    fn acquisition_failed(&self) {
        self.journal.push(Event::FailureHandled);
    }
}

/// Probe that journals every call and optionally writes a fixed result.
pub struct RecordingProbe {
    journal: Journal,
    write: Option<jni::jint>,
}

impl RecordingProbe {
    pub fn new(journal: &Journal) -> Self {
        RecordingProbe {
            journal: journal.clone(),
            write: None,
        }
    }

    pub fn writing(journal: &Journal, value: jni::jint) -> Self {
        RecordingProbe {
            journal: journal.clone(),
            write: Some(value),
        }
    }
}

impl ProbeSink for RecordingProbe {
    fn fire(&self, args: &ProbeArgs<'_>, result: &mut jni::jint) {
        self.journal.push(fired(args));
        if let Some(value) = self.write {
            *result = value;
        }
    }
}

pub fn fired(args: &ProbeArgs<'_>) -> Event {
    Event::Fired {
        first: args.first.map(|s| s.to_string_lossy().into_owned()),
        second: args.second.map(|s| s.to_string_lossy().into_owned()),
        i1: args.i1,
        i2: args.i2,
    }
}

pub fn fired_with(
    first: Option<&str>,
    second: Option<&str>,
    i1: jni::jint,
    i2: jni::jint,
) -> Event {
    Event::Fired {
        first: first.map(str::to_string),
        second: second.map(str::to_string),
        i1,
        i2,
    }
}

// =============================================================================
// Fake JNI function table
// =============================================================================
//
// The function table entries are plain extern fns, so the fake VM keeps its
// state in a thread local. libtest runs every test on its own thread.

#[derive(Default)]
pub struct JniState {
    pub failing: Vec<jni::jstring>,
    pub acquired: Vec<jni::jstring>,
    pub released: Vec<jni::jstring>,
    pub pending_exception: bool,
    pub cleared: usize,
}

thread_local! {
    pub static JNI_STATE: RefCell<JniState> = RefCell::new(JniState::default());
}

pub const FAKE_JNI_VERSION: jni::jint = jni::JNI_VERSION_1_8;

unsafe extern "system" fn get_version(_env: *mut jni::JNIEnv) -> jni::jint {
    FAKE_JNI_VERSION
}

unsafe extern "system" fn exception_clear(_env: *mut jni::JNIEnv) {
    JNI_STATE.with(|s| {
        let mut s = s.borrow_mut();
        s.pending_exception = false;
        s.cleared += 1;
    });
}

unsafe extern "system" fn exception_check(_env: *mut jni::JNIEnv) -> jni::jboolean {
    JNI_STATE.with(|s| {
        if s.borrow().pending_exception {
            jni::JNI_TRUE
        } else {
            jni::JNI_FALSE
        }
    })
}

unsafe extern "system" fn get_string_utf_chars(
    _env: *mut jni::JNIEnv,
    s: jni::jstring,
    _is_copy: *mut jni::jboolean,
) -> *const c_char {
    JNI_STATE.with(|state| {
        let mut state = state.borrow_mut();
        if state.failing.contains(&s) {
            // What HotSpot does when it cannot allocate the copy.
            state.pending_exception = true;
            return ptr::null();
        }
        state.acquired.push(s);
        (*(s as *const CString)).as_ptr()
    })
}

unsafe extern "system" fn release_string_utf_chars(
    _env: *mut jni::JNIEnv,
    s: jni::jstring,
    chars: *const c_char,
) {
    assert_eq!(chars, (*(s as *const CString)).as_ptr());
    JNI_STATE.with(|state| state.borrow_mut().released.push(s));
}

pub fn fake_function_table() -> JNINativeInterface_ {
    JNINativeInterface_ {
        reserved0: ptr::null_mut(),
        reserved1: ptr::null_mut(),
        reserved2: ptr::null_mut(),
        reserved3: ptr::null_mut(),
        GetVersion: get_version,
        _slots_5_16: [ptr::null_mut(); 12],
        ExceptionClear: exception_clear,
        _slots_18_168: [ptr::null_mut(); 151],
        GetStringUTFChars: get_string_utf_chars,
        ReleaseStringUTFChars: release_string_utf_chars,
        _slots_171_227: [ptr::null_mut(); 57],
        ExceptionCheck: exception_check,
    }
}

/// A JNIEnv backed by [`fake_function_table`].
///
/// Strings are `jstring`s pointing at boxed `CString`s owned by the fake.
pub struct FakeEnv {
    table: Box<JNINativeInterface_>,
    env: Box<jni::JNIEnv>,
    strings: Vec<Box<CString>>,
}

impl FakeEnv {
    pub fn new() -> Self {
        let table = Box::new(fake_function_table());
        let env = Box::new(&*table as *const JNINativeInterface_);
        JNI_STATE.with(|s| *s.borrow_mut() = JniState::default());
        FakeEnv {
            table,
            env,
            strings: Vec::new(),
        }
    }

    pub fn raw(&mut self) -> *mut jni::JNIEnv {
        &mut *self.env
    }

    pub fn new_string(&mut self, text: &str) -> jni::jstring {
        let boxed = Box::new(CString::new(text).unwrap());
        let handle = &*boxed as *const CString as jni::jstring;
        self.strings.push(boxed);
        handle
    }

    /// A string whose `GetStringUTFChars` fails with a pending exception.
    pub fn new_failing_string(&mut self, text: &str) -> jni::jstring {
        let handle = self.new_string(text);
        JNI_STATE.with(|s| s.borrow_mut().failing.push(handle));
        handle
    }

    pub fn state<R>(&self, f: impl FnOnce(&JniState) -> R) -> R {
        JNI_STATE.with(|s| f(&s.borrow()))
    }
}

// =============================================================================
// Fake JavaVM
// =============================================================================

unsafe extern "system" fn destroy_java_vm(_vm: *mut jni::JavaVM) -> jni::jint {
    jni::JNI_ERR
}

unsafe extern "system" fn attach_current_thread(
    _vm: *mut jni::JavaVM,
    _penv: *mut *mut c_void,
    _args: *mut c_void,
) -> jni::jint {
    jni::JNI_ERR
}

unsafe extern "system" fn detach_current_thread(_vm: *mut jni::JavaVM) -> jni::jint {
    jni::JNI_ERR
}

thread_local! {
    static VM_ENV: RefCell<*mut jni::JNIEnv> = RefCell::new(ptr::null_mut());
}

unsafe extern "system" fn get_env(
    _vm: *mut jni::JavaVM,
    penv: *mut *mut c_void,
    version: jni::jint,
) -> jni::jint {
    if version > FAKE_JNI_VERSION {
        return jni::JNI_EVERSION;
    }
    let env = VM_ENV.with(|e| *e.borrow());
    if env.is_null() {
        return jni::JNI_EDETACHED;
    }
    *penv = env as *mut c_void;
    jni::JNI_OK
}

/// A JavaVM whose `GetEnv` hands out `env` (or reports the thread as
/// detached when `env` is null).
pub struct FakeVm {
    table: Box<JNIInvokeInterface_>,
    vm: Box<jni::JavaVM>,
}

impl FakeVm {
    pub fn new(env: *mut jni::JNIEnv) -> Self {
        VM_ENV.with(|e| *e.borrow_mut() = env);
        let table = Box::new(JNIInvokeInterface_ {
            reserved0: ptr::null_mut(),
            reserved1: ptr::null_mut(),
            reserved2: ptr::null_mut(),
            DestroyJavaVM: destroy_java_vm,
            AttachCurrentThread: attach_current_thread,
            DetachCurrentThread: detach_current_thread,
            GetEnv: get_env,
        });
        let vm = Box::new(&*table as *const JNIInvokeInterface_);
        FakeVm { table, vm }
    }

    pub fn raw(&mut self) -> *mut jni::JavaVM {
        &mut *self.vm
    }
}

pub fn c(text: &str) -> CString {
    CString::new(text).unwrap()
}

pub fn text(s: &CStr) -> String {
    s.to_string_lossy().into_owned()
}
