//! Conversion of engine-native values into portable values
//!
//! Checks run in a fixed order and the first match wins:
//! null, boolean, number, string, sequence, then the textual rendering of
//! anything structured. Objects are deliberately not converted into maps.
//!
//! Sequences are walked with two guards. A sequence that contains itself
//! (directly or further down the current path) becomes `"[Circular]"`. A
//! sequence nested past `MAX_DEPTH`, or one whose elements would take the
//! result past `MAX_NODES`, becomes the summary `"[N items]"`.

use crate::core::PortableValue;
use crate::engine::{EngineContext, NativeShape, ValueHandle};
use crate::error::ScriptError;

/// Nesting depth past which sequences are summarised
pub const MAX_DEPTH: usize = 64;

/// Values converted per result before sequences are summarised
pub const MAX_NODES: usize = 100_000;

pub const CIRCULAR: &str = "[Circular]";

/// Convert `handle` (and everything it contains) into a portable value
pub fn convert_value(
    ctx: &mut dyn EngineContext,
    handle: ValueHandle,
) -> Result<PortableValue, ScriptError> {
    convert_with_budget(ctx, handle, MAX_NODES)
}

fn convert_with_budget(
    ctx: &mut dyn EngineContext,
    handle: ValueHandle,
    max_nodes: usize,
) -> Result<PortableValue, ScriptError> {
    let mut converter = Converter {
        ctx,
        path: Vec::new(),
        nodes: 1,
        max_nodes,
    };
    converter.convert_at(handle, 0)
}

struct Converter<'a> {
    ctx: &'a mut dyn EngineContext,
    /// Sequences being expanded, outermost first
    path: Vec<ValueHandle>,
    /// Values in the result so far, counting sequences being expanded
    nodes: usize,
    max_nodes: usize,
}

impl Converter<'_> {
    fn convert_at(&mut self, handle: ValueHandle, depth: usize) -> Result<PortableValue, ScriptError> {
        let value = match self.ctx.inspect(handle)? {
            NativeShape::Null => PortableValue::Null,
            NativeShape::Boolean(b) => PortableValue::Bool(b),
            NativeShape::Integer(i) => narrow_integer(i),
            NativeShape::Float(f) => narrow_float(f),
            NativeShape::String(s) => PortableValue::String(s),
            NativeShape::Sequence(len) => self.convert_sequence(handle, len, depth)?,
            NativeShape::Structured(text) => PortableValue::String(text),
        };
        Ok(value)
    }

    fn convert_sequence(
        &mut self,
        handle: ValueHandle,
        len: usize,
        depth: usize,
    ) -> Result<PortableValue, ScriptError> {
        if self.path.iter().any(|seen| self.ctx.same_value(*seen, handle)) {
            return Ok(PortableValue::String(CIRCULAR.to_string()));
        }
        if depth >= MAX_DEPTH || self.nodes + len > self.max_nodes {
            return Ok(PortableValue::String(format!("[{} items]", len)));
        }

        self.nodes += len;
        self.path.push(handle);
        let mut list = Vec::with_capacity(len);
        for index in 0..len {
            let item = self.ctx.element(handle, index)?;
            list.push(self.convert_at(item, depth + 1)?);
        }
        self.path.pop();

        Ok(PortableValue::List(list))
    }
}

fn narrow_integer(i: i64) -> PortableValue {
    match i32::try_from(i) {
        Ok(small) => PortableValue::Int(small),
        Err(_) => PortableValue::Long(i),
    }
}

/// Smallest lossless representation of a double
fn narrow_float(f: f64) -> PortableValue {
    let integral = f.is_finite() && f.fract() == 0.0 && !(f == 0.0 && f.is_sign_negative());
    if integral {
        if f >= i32::MIN as f64 && f <= i32::MAX as f64 {
            return PortableValue::Int(f as i32);
        }
        // 2^63 itself is not representable as i64
        if f >= i64::MIN as f64 && f < i64::MAX as f64 {
            return PortableValue::Long(f as i64);
        }
    }
    PortableValue::Double(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Context serving pre-built shapes by handle index, with the child
    /// indices of each sequence
    struct ShapeTable(Vec<(NativeShape, Vec<usize>)>);

    fn leaf(shape: NativeShape) -> (NativeShape, Vec<usize>) {
        (shape, Vec::new())
    }

    fn seq(children: &[usize]) -> (NativeShape, Vec<usize>) {
        (NativeShape::Sequence(children.len()), children.to_vec())
    }

    impl EngineContext for ShapeTable {
        fn eval(&mut self, _language: &str, _source: &str) -> Result<ValueHandle, ScriptError> {
            unreachable!()
        }
        fn lookup_member(
            &mut self,
            _language: &str,
            _name: &str,
        ) -> Result<Option<ValueHandle>, ScriptError> {
            unreachable!()
        }
        fn can_execute(&self, _value: ValueHandle) -> bool {
            false
        }
        fn invoke(
            &mut self,
            _callable: ValueHandle,
            _args: &[serde_json::Value],
        ) -> Result<ValueHandle, ScriptError> {
            unreachable!()
        }
        fn inspect(&mut self, value: ValueHandle) -> Result<NativeShape, ScriptError> {
            Ok(self.0[value.0].0.clone())
        }
        fn element(&mut self, sequence: ValueHandle, index: usize) -> Result<ValueHandle, ScriptError> {
            Ok(ValueHandle(self.0[sequence.0].1[index]))
        }
        fn same_value(&self, a: ValueHandle, b: ValueHandle) -> bool {
            a == b
        }
        fn dispose(self: Box<Self>) {}
    }

    fn convert_single(shape: NativeShape) -> PortableValue {
        let mut table = ShapeTable(vec![leaf(shape)]);
        convert_value(&mut table, ValueHandle(0)).unwrap()
    }

    #[test]
    fn test_primitives() {
        assert_eq!(convert_single(NativeShape::Null), PortableValue::Null);
        assert_eq!(convert_single(NativeShape::Boolean(true)), PortableValue::Bool(true));
        assert_eq!(
            convert_single(NativeShape::String("hi".into())),
            PortableValue::String("hi".into())
        );
    }

    #[test]
    fn test_number_narrowing() {
        assert_eq!(convert_single(NativeShape::Float(6.0)), PortableValue::Int(6));
        assert_eq!(convert_single(NativeShape::Float(-7.0)), PortableValue::Int(-7));
        assert_eq!(
            convert_single(NativeShape::Float(4_294_967_296.0)),
            PortableValue::Long(4_294_967_296)
        );
        assert_eq!(convert_single(NativeShape::Float(0.5)), PortableValue::Double(0.5));
        assert_eq!(convert_single(NativeShape::Float(1e20)), PortableValue::Double(1e20));
        assert_eq!(convert_single(NativeShape::Integer(12)), PortableValue::Int(12));
        assert_eq!(
            convert_single(NativeShape::Integer(i64::MAX)),
            PortableValue::Long(i64::MAX)
        );
    }

    #[test]
    fn test_negative_zero_and_nan_stay_double() {
        match convert_single(NativeShape::Float(-0.0)) {
            PortableValue::Double(f) => assert!(f == 0.0 && f.is_sign_negative()),
            other => panic!("expected double, got {:?}", other),
        }
        match convert_single(NativeShape::Float(f64::NAN)) {
            PortableValue::Double(f) => assert!(f.is_nan()),
            other => panic!("expected double, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_sequence() {
        let mut table = ShapeTable(vec![
            seq(&[1, 2]),
            leaf(NativeShape::Float(1.0)),
            seq(&[3]),
            leaf(NativeShape::String("x".into())),
        ]);
        let value = convert_value(&mut table, ValueHandle(0)).unwrap();
        assert_eq!(
            value,
            PortableValue::List(vec![
                PortableValue::Int(1),
                PortableValue::List(vec![PortableValue::String("x".into())]),
            ])
        );
    }

    #[test]
    fn test_structured_falls_back_to_text() {
        assert_eq!(
            convert_single(NativeShape::Structured("{ a: 1 }".into())),
            PortableValue::String("{ a: 1 }".into())
        );
    }

    #[test]
    fn test_self_reference_is_circular() {
        let mut table = ShapeTable(vec![seq(&[0, 1, 0]), leaf(NativeShape::Float(2.0))]);
        let value = convert_value(&mut table, ValueHandle(0)).unwrap();
        assert_eq!(
            value,
            PortableValue::List(vec![
                PortableValue::String(CIRCULAR.into()),
                PortableValue::Int(2),
                PortableValue::String(CIRCULAR.into()),
            ])
        );
    }

    #[test]
    fn test_shared_sibling_is_not_circular() {
        // [x, x] where x = [1]
        let mut table = ShapeTable(vec![seq(&[1, 1]), seq(&[2]), leaf(NativeShape::Float(1.0))]);
        let value = convert_value(&mut table, ValueHandle(0)).unwrap();
        let x = PortableValue::List(vec![PortableValue::Int(1)]);
        assert_eq!(value, PortableValue::List(vec![x.clone(), x]));
    }

    #[test]
    fn test_shared_references_stay_within_budget() {
        // x_0 = [1], x_n = [x_(n-1), x_(n-1)]: 2^41 leaves when fully expanded
        let mut shapes = vec![leaf(NativeShape::Float(1.0)), seq(&[0])];
        for n in 2..=41 {
            shapes.push(seq(&[n - 1, n - 1]));
        }
        let top = shapes.len() - 1;
        let mut table = ShapeTable(shapes);

        let value = convert_with_budget(&mut table, ValueHandle(top), 1_000).unwrap();

        fn count(value: &PortableValue) -> usize {
            match value {
                PortableValue::List(items) => 1 + items.iter().map(count).sum::<usize>(),
                _ => 1,
            }
        }
        assert!(count(&value) <= 1_000);
        let text = serde_json::to_string(&value).unwrap();
        assert!(text.contains("[2 items]"));
    }

    #[test]
    fn test_deep_nesting_is_summarised() {
        // 100 distinct sequences, each holding the next
        let mut shapes: Vec<(NativeShape, Vec<usize>)> = (0..100).map(|i| seq(&[i + 1])).collect();
        shapes.push(leaf(NativeShape::Null));
        let mut table = ShapeTable(shapes);
        let value = convert_value(&mut table, ValueHandle(0)).unwrap();

        let mut depth = 0;
        let mut current = &value;
        while let PortableValue::List(items) = current {
            depth += 1;
            current = &items[0];
        }
        assert_eq!(depth, MAX_DEPTH);
        assert_eq!(current, &PortableValue::String("[1 items]".into()));
    }
}
