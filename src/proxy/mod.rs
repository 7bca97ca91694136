//! Calling methods of live COM objects through their vtable.
//!
//! A [`ProxyBuilder`] binds the `this` pointer and vtable of one object to a linked
//! [`VTableLayout`]. The resulting [`InterfaceProxy`] dispatches by slot: each call reads
//! the function pointer from the live vtable, marshals the [`Value`] arguments according
//! to the method signature, calls through a generic trampoline and unmarshals the return
//! value and out-parameters into a [`CallOutcome`].
//!
//! # Key Components
//!
//! - [`RawInterface`] - an object's `this` pointer and vtable base
//! - [`ProxyBuilder`] - checks every slot is dispatchable on this target
//! - [`InterfaceProxy`] - the callable binding, confined to the thread that built it
//! - [`Hresult`], [`Value`], [`CallOutcome`] - call data
//!
//! # Ownership
//!
//! Proxies hold no COM reference and never call `AddRef` or `Release` on their own. The
//! code that obtained the interface pointer keeps the object alive while its proxies are in
//! use and calls [`InterfaceProxy::invalidate`] once it released it.
//!
//! # Target support
//!
//! Every argument travels in general purpose words (at most twelve after `this`). Float
//! arguments by value are therefore only supported on 32-bit x86, where they are passed on
//! the stack; float and GUID return values are not supported on any target.

mod hresult;
mod marshal;
mod trampoline;
mod value;

use std::{cell::Cell, ffi::c_void, marker::PhantomData, sync::Arc};

use tracing::{debug, trace};
use uguid::Guid;

pub use hresult::Hresult;
pub use value::{CallOutcome, Value};

use crate::{
    interface::{Direction, MarshalType},
    linker::{Slot, VTableLayout},
    proxy::marshal::{decode, Frame, MAX_WORDS, WORD},
    Error, Result,
};

/// The two addresses a proxy needs: the interface pointer passed as `this`, and the base
/// of the vtable it points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawInterface {
    this: usize,
    vtable: usize,
}

impl RawInterface {
    /// Pair `this` with `vtable`; `None` if either is null.
    #[must_use]
    pub fn new(this: usize, vtable: usize) -> Option<RawInterface> {
        if this == 0 || vtable == 0 {
            return None;
        }
        Some(RawInterface { this, vtable })
    }

    /// Read the vtable pointer from the first word of the object.
    ///
    /// Returns `None` for a null interface pointer or a null vtable.
    ///
    /// # Safety
    /// `ptr` must be null or point to a live COM object.
    #[must_use]
    pub unsafe fn from_interface_ptr(ptr: *mut c_void) -> Option<RawInterface> {
        if ptr.is_null() {
            return None;
        }
        let vtable = unsafe { ptr.cast::<usize>().read() };
        RawInterface::new(ptr as usize, vtable)
    }

    /// The interface pointer.
    #[must_use]
    pub fn this(&self) -> usize {
        self.this
    }

    /// The vtable base.
    #[must_use]
    pub fn vtable(&self) -> usize {
        self.vtable
    }
}

/// Creates [`InterfaceProxy`]s.
#[derive(Debug)]
pub struct ProxyBuilder;

impl ProxyBuilder {
    /// Bind `raw` to `layout`.
    ///
    /// The vtable itself is only read at call time.
    ///
    /// # Errors
    /// Returns [`Error::NotSupported`] naming the first slot this target can not
    /// dispatch: more than twelve argument words, float arguments off x86, a float or
    /// GUID return value, or an in-out wide string.
    pub fn build(raw: RawInterface, layout: Arc<VTableLayout>) -> Result<InterfaceProxy> {
        for slot in &layout.slots {
            dispatchable(slot)?;
        }

        debug!(
            interface = %layout.interface,
            slots = layout.len(),
            this = raw.this,
            "built interface proxy"
        );
        Ok(InterfaceProxy {
            raw,
            layout,
            released: Cell::new(false),
            _thread: PhantomData,
        })
    }
}

fn dispatchable(slot: &Slot) -> Result<()> {
    let method = &slot.signature;
    let unsupported =
        |what: String| Error::NotSupported(format!("{}::{} {what}", slot.interface, method.name));

    let words = method.argument_words(WORD);
    if words > MAX_WORDS {
        return Err(unsupported(format!(
            "takes {words} argument words, at most {MAX_WORDS} are supported"
        )));
    }
    if method.ret.is_float() || method.ret == MarshalType::Guid {
        return Err(unsupported(format!("returns {} by value", method.ret)));
    }

    for param in &method.params {
        if param.direction == Direction::In && param.ty.is_float() && !cfg!(target_arch = "x86") {
            return Err(unsupported(format!(
                "passes {} '{}' by value, only supported on x86",
                param.ty, param.name
            )));
        }
        if param.direction == Direction::InOut && param.ty == MarshalType::WideString {
            return Err(unsupported(format!(
                "has in-out string '{}', ownership of the buffer is undefined",
                param.name
            )));
        }
    }
    Ok(())
}

/// A callable binding of one object to a [`VTableLayout`].
///
/// Proxies are `!Send` and `!Sync`: calls happen on the thread that built the proxy.
#[derive(Debug)]
pub struct InterfaceProxy {
    raw: RawInterface,
    layout: Arc<VTableLayout>,
    released: Cell<bool>,
    _thread: PhantomData<*const ()>,
}

impl InterfaceProxy {
    /// The bound object.
    #[must_use]
    pub fn raw(&self) -> RawInterface {
        self.raw
    }

    /// The layout calls are dispatched by.
    #[must_use]
    pub fn layout(&self) -> &Arc<VTableLayout> {
        &self.layout
    }

    /// Returns `false` once [`InterfaceProxy::invalidate`] was called.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.released.get()
    }

    /// Record that the object was released. Later calls fail with [`Error::Released`]
    /// without reading the vtable.
    pub fn invalidate(&self) {
        self.released.set(true);
    }

    /// Call `method` with the values of its in and in-out parameters.
    ///
    /// `method` is a bare name (most derived declaration) or `Interface::Method`.
    ///
    /// # Safety
    /// The object must be alive and its vtable must match the layout: every slot up to the
    /// one called must hold a function with the declared signature. Pointer values in
    /// `args` must be valid for whatever the callee does with them.
    ///
    /// # Errors
    /// - [`Error::Released`] after [`InterfaceProxy::invalidate`]
    /// - [`Error::UnknownMethod`] if the layout has no such method
    /// - [`Error::ArgumentMismatch`] if `args` do not fit the signature
    /// - [`Error::NullSlot`] if the vtable entry is null
    /// - [`Error::Invocation`] if the method returns a failing `HRESULT`
    pub unsafe fn invoke(&self, method: &str, args: &[Value]) -> Result<CallOutcome> {
        self.ensure_valid()?;
        let Some(slot) = self.layout.find(method) else {
            return Err(Error::UnknownMethod {
                interface: self.layout.interface.clone(),
                method: method.to_string(),
            });
        };
        unsafe { self.dispatch(slot, args) }
    }

    /// Call the method in vtable slot `index`.
    ///
    /// # Safety
    /// See [`InterfaceProxy::invoke`].
    ///
    /// # Errors
    /// See [`InterfaceProxy::invoke`]; an index outside the layout is
    /// [`Error::UnknownMethod`].
    pub unsafe fn invoke_slot(&self, index: usize, args: &[Value]) -> Result<CallOutcome> {
        self.ensure_valid()?;
        let Some(slot) = self.layout.slot(index) else {
            return Err(Error::UnknownMethod {
                interface: self.layout.interface.clone(),
                method: format!("#{index}"),
            });
        };
        unsafe { self.dispatch(slot, args) }
    }

    /// Ask the object for another interface through `IUnknown::QueryInterface`.
    ///
    /// On success the returned interface carries a reference the caller owns.
    ///
    /// # Safety
    /// See [`InterfaceProxy::invoke`].
    ///
    /// # Errors
    /// Fails like [`InterfaceProxy::invoke`], with [`Error::UnknownMethod`] if the layout
    /// does not derive from `IUnknown`, and with an `E_POINTER` [`Error::Invocation`] if
    /// the object reports success but returns a null pointer.
    pub unsafe fn query_interface(&self, iid: &Guid) -> Result<RawInterface> {
        let outcome = unsafe { self.invoke("IUnknown::QueryInterface", &[Value::Guid(*iid)]) }?;
        let address = outcome.output("ppvObject").and_then(Value::as_address);

        let raw = address
            .and_then(|address| unsafe { RawInterface::from_interface_ptr(address as *mut c_void) });
        match raw {
            Some(raw) => Ok(raw),
            None => Err(Error::Invocation {
                interface: "IUnknown".to_string(),
                method: "QueryInterface".to_string(),
                status: Hresult::E_POINTER,
            }),
        }
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.released.get() {
            return Err(Error::Released(self.layout.interface.clone()));
        }
        Ok(())
    }

    unsafe fn dispatch(&self, slot: &Slot, args: &[Value]) -> Result<CallOutcome> {
        let method = &slot.signature;
        let mut frame = Frame::marshal(method, args)?;

        let entry = self.raw.vtable + slot.index * WORD;
        let function = unsafe { (entry as *const *const c_void).read() };
        if function.is_null() {
            return Err(Error::NullSlot {
                interface: self.layout.interface.clone(),
                index: slot.index,
            });
        }

        let words = frame.words();
        trace!(
            interface = %slot.interface,
            method = %method.name,
            slot = slot.index,
            words = words.len(),
            "invoke"
        );
        let raw = unsafe {
            trampoline::call(method.convention, method.ret, function, self.raw.this, &words)
        }?;

        let value = decode(method.ret, raw);
        let status = match value {
            Value::HResult(status) => Some(status),
            _ => None,
        };
        if let Some(status) = status.filter(|status| status.is_failure()) {
            debug!(interface = %slot.interface, method = %method.name, %status, "call failed");
            return Err(Error::Invocation {
                interface: slot.interface.clone(),
                method: method.name.clone(),
                status,
            });
        }

        let (outputs, retval) = frame.outputs();
        Ok(CallOutcome {
            status,
            value,
            outputs,
            retval,
        })
    }
}
