//! Object store of the simulated host with a mark and sweep collector.

use std::ffi::c_void;
use std::fmt;

use emod_core::ffi::{RawFinalizer, RawFunction};
use rustc_hash::FxHashMap;

use crate::builtins::Builtin;

pub(crate) type ObjRef = u32;

pub(crate) const NIL: ObjRef = 0;
pub(crate) const T: ObjRef = 1;

/// Integers are kept as sign and 128-bit magnitude.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SimInt {
    pub negative: bool,
    pub magnitude: u128,
}

impl SimInt {
    pub fn new(negative: bool, magnitude: u128) -> Self {
        Self {
            negative: negative && magnitude != 0,
            magnitude,
        }
    }

    pub fn from_i64(n: i64) -> Self {
        Self::new(n < 0, n.unsigned_abs() as u128)
    }

    pub fn from_i128(n: i128) -> Self {
        Self::new(n < 0, n.unsigned_abs())
    }

    pub fn to_i64(self) -> Option<i64> {
        i64::try_from(self.to_i128()?).ok()
    }

    pub fn to_i128(self) -> Option<i128> {
        if self.negative {
            if self.magnitude > i128::MIN.unsigned_abs() {
                None
            } else {
                Some((self.magnitude as i128).wrapping_neg())
            }
        } else {
            i128::try_from(self.magnitude).ok()
        }
    }
}

impl fmt::Display for SimInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.magnitude)
        } else {
            write!(f, "{}", self.magnitude)
        }
    }
}

pub(crate) struct ModuleFn {
    pub min_arity: isize,
    pub max_arity: isize,
    pub function: RawFunction,
    pub data: *mut c_void,
    pub doc: String,
    pub finalizer: Option<RawFinalizer>,
    pub interactive: Option<ObjRef>,
}

pub(crate) enum Object {
    Symbol {
        name: String,
        interned: bool,
        function: ObjRef,
        plist: ObjRef,
    },
    Int(SimInt),
    Float(f64),
    Str(String),
    Cons(ObjRef, ObjRef),
    Vector(Vec<ObjRef>),
    UserPtr {
        ptr: *mut c_void,
        finalizer: Option<RawFinalizer>,
    },
    ModuleFn(ModuleFn),
    Builtin(&'static Builtin),
}

/// A pending signal or throw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Exit {
    Signal(ObjRef, ObjRef),
    Throw(ObjRef, ObjRef),
}

impl Exit {
    pub fn refs(self) -> [ObjRef; 2] {
        match self {
            Exit::Signal(a, b) | Exit::Throw(a, b) => [a, b],
        }
    }
}

/// Finalizer call owed to a swept object.
pub(crate) struct Finalization {
    pub finalizer: RawFinalizer,
    pub data: *mut c_void,
}

impl Finalization {
    pub fn run(self) {
        unsafe { (self.finalizer)(self.data) }
    }
}

pub(crate) struct Heap {
    objects: Vec<Option<Object>>,
    free: Vec<ObjRef>,
    obarray: FxHashMap<String, ObjRef>,
    frames: Vec<Vec<ObjRef>>,
    globals: FxHashMap<ObjRef, usize>,
}

impl Heap {
    pub fn new() -> Self {
        let mut heap = Self {
            objects: Vec::new(),
            free: Vec::new(),
            obarray: FxHashMap::with_capacity_and_hasher(64, Default::default()),
            frames: vec![Vec::new()],
            globals: FxHashMap::default(),
        };
        let nil = heap.intern("nil");
        let t = heap.intern("t");
        debug_assert_eq!((nil, t), (NIL, T));
        heap
    }

    pub fn alloc(&mut self, object: Object) -> ObjRef {
        let r = match self.free.pop() {
            Some(r) => {
                self.objects[r as usize] = Some(object);
                r
            }
            None => {
                self.objects.push(Some(object));
                (self.objects.len() - 1) as ObjRef
            }
        };
        self.root(r);
        r
    }

    pub fn get(&self, r: ObjRef) -> Option<&Object> {
        self.objects.get(r as usize).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, r: ObjRef) -> Option<&mut Object> {
        self.objects.get_mut(r as usize).and_then(Option::as_mut)
    }

    pub fn is_live(&self, r: ObjRef) -> bool {
        self.get(r).is_some()
    }

    pub fn live_objects(&self) -> usize {
        self.objects.iter().filter(|o| o.is_some()).count()
    }

    // Rooting.

    pub fn root(&mut self, r: ObjRef) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push(r);
        }
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    pub fn pop_frame(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn global_ref(&mut self, r: ObjRef) {
        *self.globals.entry(r).or_insert(0) += 1;
    }

    pub fn free_global(&mut self, r: ObjRef) {
        if let Some(count) = self.globals.get_mut(&r) {
            *count -= 1;
            if *count == 0 {
                self.globals.remove(&r);
            }
        }
    }

    // Constructors.

    pub fn intern(&mut self, name: &str) -> ObjRef {
        if let Some(&r) = self.obarray.get(name) {
            return r;
        }
        let r = self.alloc(Object::Symbol {
            name: name.to_string(),
            interned: true,
            function: NIL,
            plist: NIL,
        });
        self.obarray.insert(name.to_string(), r);
        r
    }

    pub fn make_symbol(&mut self, name: String) -> ObjRef {
        self.alloc(Object::Symbol {
            name,
            interned: false,
            function: NIL,
            plist: NIL,
        })
    }

    pub fn int(&mut self, n: SimInt) -> ObjRef {
        self.alloc(Object::Int(n))
    }

    pub fn string(&mut self, s: impl Into<String>) -> ObjRef {
        self.alloc(Object::Str(s.into()))
    }

    pub fn cons(&mut self, car: ObjRef, cdr: ObjRef) -> ObjRef {
        self.alloc(Object::Cons(car, cdr))
    }

    pub fn list(&mut self, items: &[ObjRef]) -> ObjRef {
        items.iter().rev().fold(NIL, |tail, &item| self.cons(item, tail))
    }

    /// Elements of a proper list.
    pub fn list_items(&self, mut r: ObjRef) -> Option<Vec<ObjRef>> {
        let mut items = Vec::new();
        while r != NIL {
            match self.get(r)? {
                Object::Cons(car, cdr) => {
                    items.push(*car);
                    r = *cdr;
                }
                _ => return None,
            }
        }
        Some(items)
    }

    pub fn signal(&mut self, name: &str, data: &[ObjRef]) -> Exit {
        let symbol = self.intern(name);
        let data = self.list(data);
        Exit::Signal(symbol, data)
    }

    pub fn error(&mut self, message: &str) -> Exit {
        let message = self.string(message);
        self.signal("error", &[message])
    }

    pub fn wrong_type(&mut self, predicate: &str, value: ObjRef) -> Exit {
        let predicate = self.intern(predicate);
        self.signal("wrong-type-argument", &[predicate, value])
    }

    // Symbols.

    pub fn symbol_name(&self, r: ObjRef) -> Option<&str> {
        match self.get(r)? {
            Object::Symbol { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_symbol(&self, r: ObjRef) -> bool {
        matches!(self.get(r), Some(Object::Symbol { .. }))
    }

    pub fn set_function(&mut self, symbol: ObjRef, definition: ObjRef) -> bool {
        match self.get_mut(symbol) {
            Some(Object::Symbol { function, .. }) => {
                *function = definition;
                true
            }
            _ => false,
        }
    }

    pub fn get_prop(&self, symbol: ObjRef, key: ObjRef) -> ObjRef {
        let Some(Object::Symbol { plist, .. }) = self.get(symbol) else {
            return NIL;
        };
        let items = self.list_items(*plist).unwrap_or_default();
        items
            .chunks(2)
            .find(|pair| self.eq(pair[0], key))
            .and_then(|pair| pair.get(1).copied())
            .unwrap_or(NIL)
    }

    pub fn put_prop(&mut self, symbol: ObjRef, key: ObjRef, value: ObjRef) -> bool {
        let Some(Object::Symbol { plist, .. }) = self.get(symbol) else {
            return false;
        };
        let mut items = self.list_items(*plist).unwrap_or_default();
        match items.chunks(2).position(|pair| self.eq(pair[0], key)) {
            Some(pair) if pair * 2 + 1 < items.len() => items[pair * 2 + 1] = value,
            _ => items.extend([key, value]),
        }
        let list = self.list(&items);
        if let Some(Object::Symbol { plist, .. }) = self.get_mut(symbol) {
            *plist = list;
        }
        true
    }

    // Comparison.

    /// `eq`: identity, except that fixnums compare by value.
    pub fn eq(&self, a: ObjRef, b: ObjRef) -> bool {
        if a == b {
            return true;
        }
        match (self.get(a), self.get(b)) {
            (Some(Object::Int(x)), Some(Object::Int(y))) => x == y && x.to_i64().is_some(),
            _ => false,
        }
    }

    pub fn equal(&self, a: ObjRef, b: ObjRef) -> bool {
        if self.eq(a, b) {
            return true;
        }
        match (self.get(a), self.get(b)) {
            (Some(Object::Int(x)), Some(Object::Int(y))) => x == y,
            (Some(Object::Float(x)), Some(Object::Float(y))) => x.to_bits() == y.to_bits(),
            (Some(Object::Str(x)), Some(Object::Str(y))) => x == y,
            (Some(Object::Cons(a1, d1)), Some(Object::Cons(a2, d2))) => self.equal(*a1, *a2) && self.equal(*d1, *d2),
            (Some(Object::Vector(x)), Some(Object::Vector(y))) => {
                x.len() == y.len() && x.iter().zip(y).all(|(&p, &q)| self.equal(p, q))
            }
            _ => false,
        }
    }

    // Collection.

    /// Frees every object unreachable from interned symbols, live frames
    /// and global references. Finalizers are returned rather than run so
    /// the caller can release its borrow first.
    pub fn collect(&mut self) -> (usize, Vec<Finalization>) {
        let mut marked = vec![false; self.objects.len()];
        let mut stack: Vec<ObjRef> = self
            .obarray
            .values()
            .copied()
            .chain(self.frames.iter().flatten().copied())
            .chain(self.globals.keys().copied())
            .collect();
        while let Some(r) = stack.pop() {
            let Some(seen) = marked.get_mut(r as usize) else {
                continue;
            };
            if *seen {
                continue;
            }
            *seen = true;
            match self.get(r) {
                Some(Object::Symbol { function, plist, .. }) => stack.extend([*function, *plist]),
                Some(Object::Cons(car, cdr)) => stack.extend([*car, *cdr]),
                Some(Object::Vector(items)) => stack.extend(items.iter().copied()),
                Some(Object::ModuleFn(ModuleFn {
                    interactive: Some(spec), ..
                })) => stack.push(*spec),
                _ => {}
            }
        }

        let mut freed = 0;
        let mut finalizations = Vec::new();
        for (index, slot) in self.objects.iter_mut().enumerate() {
            if marked[index] || slot.is_none() {
                continue;
            }
            if let Some(object) = slot.take() {
                finalizations.extend(Self::finalization_of(&object));
                self.free.push(index as ObjRef);
                freed += 1;
            }
        }
        (freed, finalizations)
    }

    /// Finalizers of every object still alive, for host shutdown.
    pub fn drain_finalizers(&mut self) -> Vec<Finalization> {
        self.objects
            .iter_mut()
            .filter_map(|slot| slot.take())
            .filter_map(|object| Self::finalization_of(&object))
            .collect()
    }

    fn finalization_of(object: &Object) -> Option<Finalization> {
        match object {
            Object::UserPtr {
                ptr,
                finalizer: Some(finalizer),
            } => Some(Finalization {
                finalizer: *finalizer,
                data: *ptr,
            }),
            Object::ModuleFn(ModuleFn {
                data,
                finalizer: Some(finalizer),
                ..
            }) => Some(Finalization {
                finalizer: *finalizer,
                data: *data,
            }),
            _ => None,
        }
    }
}
