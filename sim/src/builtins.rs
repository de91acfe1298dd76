//! Primitive functions of the simulated host.

use std::rc::Rc;

use crate::heap::{Exit, NIL, ObjRef, Object, SimInt, T};
use crate::host::{self, Host};
use crate::printer::print;
use crate::reader::{self, ReadError};

pub(crate) type BuiltinFn = fn(&Rc<Host>, &[ObjRef]) -> Result<ObjRef, Exit>;

pub(crate) struct Builtin {
    pub name: &'static str,
    pub min: usize,
    pub max: Option<usize>,
    pub func: BuiltinFn,
}

const fn subr(name: &'static str, min: usize, max: Option<usize>, func: BuiltinFn) -> Builtin {
    Builtin { name, min, max, func }
}

pub(crate) static BUILTINS: &[Builtin] = &[
    subr("car", 1, Some(1), car),
    subr("cdr", 1, Some(1), cdr),
    subr("cons", 2, Some(2), cons),
    subr("list", 0, None, list),
    subr("vector", 0, None, vector),
    subr("length", 1, Some(1), length),
    subr("eq", 2, Some(2), eq),
    subr("equal", 2, Some(2), equal),
    subr("null", 1, Some(1), null),
    subr("identity", 1, Some(1), identity),
    subr("stringp", 1, Some(1), stringp),
    subr("integerp", 1, Some(1), integerp),
    subr("error", 1, None, error),
    subr("signal", 2, Some(2), signal),
    subr("throw", 2, Some(2), throw),
    subr("define-error", 2, Some(3), define_error),
    subr("gensym", 0, Some(1), gensym),
    subr("make-symbol", 1, Some(1), make_symbol),
    subr("intern", 1, Some(1), intern),
    subr("symbol-name", 1, Some(1), symbol_name),
    subr("defalias", 2, Some(3), defalias),
    subr("fmakunbound", 1, Some(1), fmakunbound),
    subr("put", 3, Some(3), put),
    subr("get", 2, Some(2), get),
    subr("symbol-function", 1, Some(1), symbol_function),
    subr("funcall", 1, None, funcall),
    subr("format", 1, None, format),
    subr("prin1-to-string", 1, Some(1), prin1_to_string),
    subr("read", 1, Some(1), read),
    subr("eval", 1, Some(2), eval),
    subr("garbage-collect", 0, Some(0), garbage_collect),
    subr("provide", 1, Some(2), provide),
    subr("featurep", 1, Some(1), featurep),
    subr("+", 0, None, plus),
    subr("-", 0, None, minus),
    subr("*", 0, None, times),
];

fn bool_obj(b: bool) -> ObjRef {
    if b { T } else { NIL }
}

fn car(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    list_part(host, args[0], |car, _| car)
}

fn cdr(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    list_part(host, args[0], |_, cdr| cdr)
}

fn list_part(host: &Rc<Host>, r: ObjRef, pick: fn(ObjRef, ObjRef) -> ObjRef) -> Result<ObjRef, Exit> {
    if r == NIL {
        return Ok(NIL);
    }
    let cell = match host.heap.borrow().get(r) {
        Some(Object::Cons(car, cdr)) => Some((*car, *cdr)),
        _ => None,
    };
    match cell {
        Some((car, cdr)) => Ok(pick(car, cdr)),
        None => Err(host.wrong_type("listp", r)),
    }
}

fn cons(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    Ok(host.heap.borrow_mut().cons(args[0], args[1]))
}

fn list(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    Ok(host.heap.borrow_mut().list(args))
}

fn vector(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    Ok(host.heap.borrow_mut().alloc(Object::Vector(args.to_vec())))
}

fn length(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let len = {
        let heap = host.heap.borrow();
        match heap.get(args[0]) {
            Some(Object::Vector(items)) => Some(items.len()),
            Some(Object::Str(s)) => Some(s.chars().count()),
            _ => heap.list_items(args[0]).map(|items| items.len()),
        }
    };
    match len {
        Some(len) => Ok(host.heap.borrow_mut().int(SimInt::from_i64(len as i64))),
        None => Err(host.wrong_type("sequencep", args[0])),
    }
}

fn eq(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    Ok(bool_obj(host.heap.borrow().eq(args[0], args[1])))
}

fn equal(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    Ok(bool_obj(host.heap.borrow().equal(args[0], args[1])))
}

fn null(_host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    Ok(bool_obj(args[0] == NIL))
}

fn identity(_host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    Ok(args[0])
}

fn stringp(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    Ok(bool_obj(matches!(host.heap.borrow().get(args[0]), Some(Object::Str(_)))))
}

fn integerp(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    Ok(bool_obj(matches!(host.heap.borrow().get(args[0]), Some(Object::Int(_)))))
}

fn error(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let message = format_objects(host, args)?;
    Err(host.error(&message))
}

fn signal(_host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    Err(Exit::Signal(args[0], args[1]))
}

fn throw(_host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    Err(Exit::Throw(args[0], args[1]))
}

fn define_error(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let mut heap = host.heap.borrow_mut();
    if !heap.is_symbol(args[0]) {
        drop(heap);
        return Err(host.wrong_type("symbolp", args[0]));
    }
    let parent = match args.get(2) {
        Some(&parent) if parent != NIL => parent,
        _ => heap.intern("error"),
    };
    let conditions = heap.list(&[args[0], parent]);
    let conditions_key = heap.intern("error-conditions");
    let message_key = heap.intern("error-message");
    heap.put_prop(args[0], conditions_key, conditions);
    heap.put_prop(args[0], message_key, args[1]);
    Ok(NIL)
}

fn string_arg(host: &Rc<Host>, r: ObjRef) -> Result<String, Exit> {
    let text = match host.heap.borrow().get(r) {
        Some(Object::Str(s)) => Some(s.clone()),
        _ => None,
    };
    text.ok_or_else(|| host.wrong_type("stringp", r))
}

fn symbol_arg(host: &Rc<Host>, r: ObjRef) -> Result<ObjRef, Exit> {
    if host.heap.borrow().is_symbol(r) {
        Ok(r)
    } else {
        Err(host.wrong_type("symbolp", r))
    }
}

fn gensym(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let prefix = match args.first() {
        Some(&prefix) if prefix != NIL => string_arg(host, prefix)?,
        _ => "g".to_string(),
    };
    let name = format!("{}{}", prefix, host.next_gensym());
    Ok(host.heap.borrow_mut().make_symbol(name))
}

fn make_symbol(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let name = string_arg(host, args[0])?;
    Ok(host.heap.borrow_mut().make_symbol(name))
}

fn intern(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let name = string_arg(host, args[0])?;
    Ok(host.heap.borrow_mut().intern(&name))
}

fn symbol_name(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let name = host.heap.borrow().symbol_name(args[0]).map(str::to_owned);
    match name {
        Some(name) => Ok(host.heap.borrow_mut().string(name)),
        None => Err(host.wrong_type("symbolp", args[0])),
    }
}

fn defalias(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let symbol = symbol_arg(host, args[0])?;
    host.heap.borrow_mut().set_function(symbol, args[1]);
    Ok(symbol)
}

fn fmakunbound(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let symbol = symbol_arg(host, args[0])?;
    host.heap.borrow_mut().set_function(symbol, NIL);
    Ok(symbol)
}

fn put(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let symbol = symbol_arg(host, args[0])?;
    host.heap.borrow_mut().put_prop(symbol, args[1], args[2]);
    Ok(args[2])
}

fn get(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let symbol = symbol_arg(host, args[0])?;
    Ok(host.heap.borrow().get_prop(symbol, args[1]))
}

fn symbol_function(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let symbol = symbol_arg(host, args[0])?;
    match host.heap.borrow().get(symbol) {
        Some(Object::Symbol { function, .. }) => Ok(*function),
        _ => Ok(NIL),
    }
}

fn funcall(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    host::funcall(host, args[0], &args[1..])
}

/// Expands `%s`, `%S`, `%d` and `%%` in the first argument.
pub(crate) fn format_objects(host: &Rc<Host>, args: &[ObjRef]) -> Result<String, Exit> {
    let template = string_arg(host, args[0])?;
    let mut rest = args[1..].iter();
    let mut out = String::new();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let directive = chars.next();
        if directive == Some('%') {
            out.push('%');
            continue;
        }
        let Some(&arg) = rest.next() else {
            return Err(host.error("Not enough arguments for format string"));
        };
        let piece = {
            let heap = host.heap.borrow();
            match directive {
                Some('s') => Ok(print(&heap, arg, false)),
                Some('S') => Ok(print(&heap, arg, true)),
                Some('d') => match heap.get(arg) {
                    Some(Object::Int(n)) => Ok(n.to_string()),
                    Some(Object::Float(d)) => Ok((d.trunc() as i64).to_string()),
                    _ => Err("Format specifier doesn’t match argument type"),
                },
                _ => Err("Invalid format operation"),
            }
        };
        match piece {
            Ok(piece) => out.push_str(&piece),
            Err(message) => return Err(host.error(message)),
        }
    }
    Ok(out)
}

fn format(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let text = format_objects(host, args)?;
    Ok(host.heap.borrow_mut().string(text))
}

fn prin1_to_string(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let text = print(&host.heap.borrow(), args[0], true);
    Ok(host.heap.borrow_mut().string(text))
}

fn read(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let source = string_arg(host, args[0])?;
    let mut heap = host.heap.borrow_mut();
    match reader::read(&source) {
        Ok(datum) => Ok(reader::build(&mut heap, &datum)),
        Err(ReadError::InvalidSyntax(text)) => {
            let text = heap.string(text);
            Err(heap.signal("invalid-read-syntax", &[text]))
        }
        Err(ReadError::EndOfFile) => Err(heap.signal("end-of-file", &[])),
        Err(ReadError::Overflow(text)) => {
            let text = heap.string(text);
            Err(heap.signal("overflow-error", &[text]))
        }
    }
}

fn eval(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    host::eval(host, args[0])
}

fn garbage_collect(host: &Rc<Host>, _args: &[ObjRef]) -> Result<ObjRef, Exit> {
    host.collect_garbage();
    Ok(T)
}

fn provide(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let feature = symbol_arg(host, args[0])?;
    let name = host.heap.borrow().symbol_name(feature).map(str::to_owned).unwrap_or_default();
    let mut features = host.features.borrow_mut();
    if !features.contains(&name) {
        features.push(name);
    }
    Ok(feature)
}

fn featurep(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    let name = host.heap.borrow().symbol_name(args[0]).map(str::to_owned);
    Ok(bool_obj(name.is_some_and(|name| host.features.borrow().contains(&name))))
}

enum Number {
    Int(i128),
    Float(f64),
}

fn number_arg(host: &Rc<Host>, r: ObjRef) -> Result<Number, Exit> {
    let number = match host.heap.borrow().get(r) {
        Some(Object::Int(n)) => n.to_i128().map(Number::Int),
        Some(Object::Float(d)) => Some(Number::Float(*d)),
        _ => None,
    };
    number.ok_or_else(|| host.wrong_type("number-or-marker-p", r))
}

fn arith(
    host: &Rc<Host>,
    args: &[ObjRef],
    identity: i128,
    int_op: fn(i128, i128) -> Option<i128>,
    float_op: fn(f64, f64) -> f64,
) -> Result<ObjRef, Exit> {
    let mut acc = Number::Int(identity);
    for (i, &arg) in args.iter().enumerate() {
        let n = number_arg(host, arg)?;
        if i == 0 && args.len() > 1 {
            acc = n;
            continue;
        }
        acc = match (acc, n) {
            (Number::Int(a), Number::Int(b)) => match int_op(a, b) {
                Some(v) => Number::Int(v),
                None => return Err(host.signal("overflow-error", &[])),
            },
            (Number::Int(a), Number::Float(b)) => Number::Float(float_op(a as f64, b)),
            (Number::Float(a), Number::Int(b)) => Number::Float(float_op(a, b as f64)),
            (Number::Float(a), Number::Float(b)) => Number::Float(float_op(a, b)),
        };
    }
    let mut heap = host.heap.borrow_mut();
    Ok(match acc {
        Number::Int(v) => heap.int(SimInt::from_i128(v)),
        Number::Float(d) => heap.alloc(Object::Float(d)),
    })
}

fn plus(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    arith(host, args, 0, i128::checked_add, |a, b| a + b)
}

fn minus(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    arith(host, args, 0, i128::checked_sub, |a, b| a - b)
}

fn times(host: &Rc<Host>, args: &[ObjRef]) -> Result<ObjRef, Exit> {
    arith(host, args, 1, i128::checked_mul, |a, b| a * b)
}
