//! An in-process COM object with a hand-written vtable.
//!
//! `ICalc` derives from `IUnknown`; its vtable order is
//! `QueryInterface, AddRef, Release, Add, Double, Fail, Missing, Length, Echo`, with a
//! null entry for `Missing`.

use std::{cell::Cell, ffi::c_void};

use uguid::{guid, Guid};

use crate::{
    interface::{
        Direction, InterfaceSignature, MarshalType, MethodSignature, SignatureSet, IID_IUNKNOWN,
    },
    proxy::Hresult,
};

pub const IID_ICALC: Guid = guid!("3b8e2c4a-51f0-4d6e-9a7b-0c1d2e3f4a5b");

type Method = unsafe extern "system" fn(this: *mut FakeCalc) -> i32;

#[repr(C)]
pub struct CalcVtbl {
    query_interface:
        unsafe extern "system" fn(this: *mut FakeCalc, riid: *const Guid, out: *mut *mut c_void) -> i32,
    add_ref: unsafe extern "system" fn(this: *mut FakeCalc) -> u32,
    release: unsafe extern "system" fn(this: *mut FakeCalc) -> u32,
    add: unsafe extern "system" fn(this: *mut FakeCalc, a: i32, b: i32, sum: *mut i32) -> i32,
    double: unsafe extern "system" fn(this: *mut FakeCalc, value: *mut i64) -> i32,
    fail: Method,
    missing: Option<Method>,
    length: unsafe extern "system" fn(this: *mut FakeCalc, text: *const u16, len: *mut u32) -> i32,
    echo: unsafe extern "system" fn(this: *mut FakeCalc, riid: *const Guid, out: *mut Guid) -> i32,
}

static CALC_VTBL: CalcVtbl = CalcVtbl {
    query_interface,
    add_ref,
    release,
    add,
    double,
    fail,
    missing: None,
    length,
    echo,
};

/// The object; the vtable pointer is its first field.
#[repr(C)]
pub struct FakeCalc {
    vtable: *const CalcVtbl,
    refs: Cell<u32>,
    calls: Cell<u32>,
}

impl FakeCalc {
    pub fn new() -> Self {
        FakeCalc {
            vtable: &CALC_VTBL,
            refs: Cell::new(1),
            calls: Cell::new(0),
        }
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self as *const FakeCalc as *mut c_void
    }

    pub fn vtable_address(&self) -> usize {
        self.vtable as usize
    }

    pub fn refs(&self) -> u32 {
        self.refs.get()
    }

    /// Calls of the `ICalc` methods proper.
    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

unsafe fn object<'a>(this: *mut FakeCalc) -> &'a FakeCalc {
    unsafe { &*this }
}

unsafe extern "system" fn query_interface(
    this: *mut FakeCalc,
    riid: *const Guid,
    out: *mut *mut c_void,
) -> i32 {
    let riid = unsafe { *riid };
    if riid == IID_IUNKNOWN || riid == IID_ICALC {
        unsafe {
            add_ref(this);
            *out = this.cast();
        }
        Hresult::S_OK.0
    } else {
        unsafe { *out = std::ptr::null_mut() };
        Hresult::E_NOINTERFACE.0
    }
}

unsafe extern "system" fn add_ref(this: *mut FakeCalc) -> u32 {
    let object = unsafe { object(this) };
    object.refs.set(object.refs.get() + 1);
    object.refs.get()
}

unsafe extern "system" fn release(this: *mut FakeCalc) -> u32 {
    let object = unsafe { object(this) };
    object.refs.set(object.refs.get().saturating_sub(1));
    object.refs.get()
}

unsafe extern "system" fn add(this: *mut FakeCalc, a: i32, b: i32, sum: *mut i32) -> i32 {
    let object = unsafe { object(this) };
    object.calls.set(object.calls.get() + 1);
    unsafe { *sum = a + b };
    Hresult::S_OK.0
}

unsafe extern "system" fn double(this: *mut FakeCalc, value: *mut i64) -> i32 {
    let object = unsafe { object(this) };
    object.calls.set(object.calls.get() + 1);
    unsafe { *value *= 2 };
    Hresult::S_OK.0
}

unsafe extern "system" fn fail(this: *mut FakeCalc) -> i32 {
    let object = unsafe { object(this) };
    object.calls.set(object.calls.get() + 1);
    Hresult::E_FAIL.0
}

unsafe extern "system" fn length(this: *mut FakeCalc, text: *const u16, len: *mut u32) -> i32 {
    let object = unsafe { object(this) };
    object.calls.set(object.calls.get() + 1);
    let text = unsafe { widestring::U16CStr::from_ptr_str(text) };
    unsafe { *len = text.len() as u32 };
    Hresult::S_OK.0
}

unsafe extern "system" fn echo(this: *mut FakeCalc, riid: *const Guid, out: *mut Guid) -> i32 {
    let object = unsafe { object(this) };
    object.calls.set(object.calls.get() + 1);
    unsafe { *out = *riid };
    Hresult::S_OK.0
}

/// `IUnknown`, `IClassFactory` and `ICalc`.
pub fn calc_signatures() -> SignatureSet {
    let mut set = SignatureSet::with_builtins();
    set.insert(
        InterfaceSignature::builder("ICalc")
            .iid(IID_ICALC)
            .base("IUnknown")
            .method(
                MethodSignature::new("Add")
                    .param("a", MarshalType::I32, Direction::In)
                    .param("b", MarshalType::I32, Direction::In)
                    .retval("sum", MarshalType::I32),
            )
            .method(MethodSignature::new("Double").param(
                "value",
                MarshalType::I64,
                Direction::InOut,
            ))
            .method(MethodSignature::new("Fail"))
            .method(MethodSignature::new("Missing"))
            .method(
                MethodSignature::new("Length")
                    .param("text", MarshalType::WideString, Direction::In)
                    .retval("len", MarshalType::U32),
            )
            .method(
                MethodSignature::new("Echo")
                    .param("riid", MarshalType::Guid, Direction::In)
                    .retval("copy", MarshalType::Guid),
            )
            .build()
            .unwrap(),
    );
    set
}
