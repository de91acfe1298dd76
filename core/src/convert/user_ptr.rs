use std::any::TypeId;
use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::ptr::{self, NonNull};

use super::{FromHost, IntoHost};
use crate::env::{Env, Value};
use crate::error::{Error, Result};
use crate::ffi::RawFinalizer;

const USER_BOX_MAGIC: u64 = 0x656d_6f64_7573_6572;

#[repr(C)]
struct Header {
    magic: u64,
    type_id: TypeId,
    drop: unsafe fn(*mut Header),
}

#[repr(C)]
struct UserBox<T> {
    header: Header,
    value: T,
}

unsafe fn drop_user_box<T>(header: *mut Header) {
    drop(unsafe { Box::from_raw(header as *mut UserBox<T>) });
}

/// Shared finalizer of every user pointer created here; the payload's own
/// drop routine is read from its header.
unsafe extern "C" fn finalize_user_box(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    let header = ptr as *mut Header;
    let dropped = catch_unwind(AssertUnwindSafe(|| unsafe { ((*header).drop)(header) }));
    if dropped.is_err() {
        tracing::warn!(target: "emod::user_ptr", "panic while finalizing a user pointer");
    }
}

fn is_user_box_finalizer(finalizer: Option<RawFinalizer>) -> bool {
    finalizer.is_some_and(|fin| ptr::fn_addr_eq(fin, finalize_user_box as RawFinalizer))
}

fn type_mismatch() -> Error {
    Error::runtime("User ptr type mismatch")
}

/// A native value on its way to the host. Converting it hands ownership to
/// the host's garbage collector, which drops it once the user pointer
/// becomes unreachable.
pub struct OwnedUserPtr<T: 'static> {
    boxed: Box<UserBox<T>>,
}

impl<T: 'static> OwnedUserPtr<T> {
    pub fn new(value: T) -> Self {
        Self {
            boxed: Box::new(UserBox {
                header: Header {
                    magic: USER_BOX_MAGIC,
                    type_id: TypeId::of::<T>(),
                    drop: drop_user_box::<T>,
                },
                value,
            }),
        }
    }

    pub fn into_inner(self) -> T {
        self.boxed.value
    }
}

impl<T: 'static> IntoHost for OwnedUserPtr<T> {
    fn into_host(self, env: Env) -> Result<Value> {
        let raw = Box::into_raw(self.boxed);
        let value = env.make_user_ptr(Some(finalize_user_box), raw as *mut c_void);
        if env.non_local_exit_check().is_pending() {
            // The host did not take ownership.
            drop(unsafe { Box::from_raw(raw) });
            return Err(Error::NonLocalExit);
        }
        Ok(value)
    }
}

/// A typed view of a user pointer owned by the host.
///
/// The view stays valid while the host value is reachable, which the
/// caller guarantees for the duration of the callback it was extracted in.
pub struct UserPtr<T: 'static> {
    ptr: NonNull<UserBox<T>>,
    _marker: PhantomData<*const T>,
}

impl<T: 'static> UserPtr<T> {
    pub fn get(&self) -> &T {
        unsafe { &self.ptr.as_ref().value }
    }

    pub fn as_ptr(&self) -> *const T {
        unsafe { &raw const (*self.ptr.as_ptr()).value }
    }
}

impl<T: 'static> Clone for UserPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for UserPtr<T> {}

impl<T: 'static> Deref for UserPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for UserPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UserPtr").field(self.get()).finish()
    }
}

impl<T: 'static> FromHost for UserPtr<T> {
    fn from_host(env: Env, value: Value) -> Result<Self> {
        let finalizer = env.get_user_finalizer(value);
        env.maybe_non_local_exit()?;
        if !is_user_box_finalizer(finalizer) {
            return Err(type_mismatch());
        }
        let raw = env.get_user_ptr(value) as *mut UserBox<T>;
        env.maybe_non_local_exit()?;
        let ptr = NonNull::new(raw).ok_or_else(type_mismatch)?;
        let header = unsafe { &(*(raw as *const Header)) };
        if header.magic != USER_BOX_MAGIC || header.type_id != TypeId::of::<T>() {
            return Err(type_mismatch());
        }
        Ok(UserPtr {
            ptr,
            _marker: PhantomData,
        })
    }
}
