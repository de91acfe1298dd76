use crate::heap::{Heap, ObjRef, Object};

const MAX_DEPTH: usize = 64;

/// `prin1` representation when `escape` is set, `princ` otherwise.
pub(crate) fn print(heap: &Heap, r: ObjRef, escape: bool) -> String {
    let mut out = String::new();
    print_into(heap, r, escape, 0, &mut out);
    out
}

fn print_into(heap: &Heap, r: ObjRef, escape: bool, depth: usize, out: &mut String) {
    if depth > MAX_DEPTH {
        out.push_str("...");
        return;
    }
    match heap.get(r) {
        None => out.push_str("#<dead object>"),
        Some(Object::Symbol { name, .. }) => out.push_str(name),
        Some(Object::Int(n)) => out.push_str(&n.to_string()),
        Some(Object::Float(d)) => out.push_str(&format_float(*d)),
        Some(Object::Str(s)) if escape => {
            out.push('"');
            for c in s.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
        }
        Some(Object::Str(s)) => out.push_str(s),
        Some(Object::Cons(..)) => {
            out.push('(');
            let mut cursor = r;
            let mut first = true;
            loop {
                match heap.get(cursor) {
                    Some(Object::Cons(car, cdr)) => {
                        if !first {
                            out.push(' ');
                        }
                        first = false;
                        print_into(heap, *car, escape, depth + 1, out);
                        cursor = *cdr;
                    }
                    _ if cursor == crate::heap::NIL => break,
                    _ => {
                        out.push_str(" . ");
                        print_into(heap, cursor, escape, depth + 1, out);
                        break;
                    }
                }
            }
            out.push(')');
        }
        Some(Object::Vector(items)) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                print_into(heap, *item, escape, depth + 1, out);
            }
            out.push(']');
        }
        Some(Object::UserPtr { ptr, finalizer }) => {
            let fin = finalizer.map_or(0, |f| f as usize);
            out.push_str(&format!("#<user-ptr ptr={:p} finalizer={:#x}>", *ptr, fin));
        }
        Some(Object::ModuleFn(_)) => out.push_str("#<module function>"),
        Some(Object::Builtin(builtin)) => {
            out.push_str("#<subr ");
            out.push_str(builtin.name);
            out.push('>');
        }
    }
}

fn format_float(d: f64) -> String {
    if d.is_nan() {
        "0.0e+NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "1.0e+INF" } else { "-1.0e+INF" }.to_string()
    } else if d.fract() == 0.0 && d.abs() < 1e16 {
        format!("{:.1}", d)
    } else {
        format!("{}", d)
    }
}
