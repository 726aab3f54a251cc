//! Sources that ignore the document.

use crate::error::{Result, XiphosError};
use crate::index::reader::LeafReaderContext;
use crate::search::function::{FunctionValues, MutableValue, ValueContext, ValueSource};

/// A number that is the same for every document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Constant {
    Int(i64),
    Float(f32),
    Double(f64),
}

/// Evaluator of a [`Constant`].
#[derive(Debug)]
pub(crate) struct ConstValues {
    description: String,
    value: Constant,
}

impl ConstValues {
    pub(crate) fn boxed(description: String, value: Constant) -> Box<dyn FunctionValues> {
        Box::new(ConstValues { description, value })
    }
}

impl FunctionValues for ConstValues {
    fn double_val(&mut self, _doc: i32) -> Result<f64> {
        Ok(match self.value {
            Constant::Int(v) => v as f64,
            Constant::Float(v) => v as f64,
            Constant::Double(v) => v,
        })
    }

    fn float_val(&mut self, _doc: i32) -> Result<f32> {
        Ok(match self.value {
            Constant::Int(v) => v as f32,
            Constant::Float(v) => v,
            Constant::Double(v) => v as f32,
        })
    }

    fn long_val(&mut self, _doc: i32) -> Result<i64> {
        Ok(match self.value {
            Constant::Int(v) => v,
            Constant::Float(v) => v as i64,
            Constant::Double(v) => v as i64,
        })
    }

    fn bool_val(&mut self, doc: i32) -> Result<bool> {
        Ok(self.double_val(doc)? != 0.0)
    }

    fn str_val(&mut self, _doc: i32) -> Result<Option<String>> {
        Ok(Some(match self.value {
            Constant::Int(v) => v.to_string(),
            Constant::Float(v) => v.to_string(),
            Constant::Double(v) => v.to_string(),
        }))
    }

    fn describe(&mut self, doc: i32) -> Result<String> {
        let val = self.str_val(doc)?.unwrap_or_default();
        Ok(format!("{}={}", self.description, val))
    }

    fn fill_value(&mut self, _doc: i32, value: &mut MutableValue) -> Result<()> {
        *value = match self.value {
            Constant::Int(v) => MutableValue::Long(v),
            Constant::Float(v) => MutableValue::Float(v),
            Constant::Double(v) => MutableValue::Double(v),
        };
        Ok(())
    }
}

/// `const(v)`: a float constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstValueSource {
    constant: f32,
}

impl ConstValueSource {
    pub fn new(constant: f32) -> Self {
        ConstValueSource { constant }
    }

    pub fn value(&self) -> f32 {
        self.constant
    }
}

impl ValueSource for ConstValueSource {
    fn get_values(&self, _context: &ValueContext, _leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(ConstValues::boxed(self.description(), Constant::Float(self.constant)))
    }

    fn description(&self) -> String {
        format!("const({})", self.constant)
    }
}

/// A double constant, described by its bare value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoubleConstValueSource {
    constant: f64,
}

impl DoubleConstValueSource {
    pub fn new(constant: f64) -> Self {
        DoubleConstValueSource { constant }
    }
}

impl ValueSource for DoubleConstValueSource {
    fn get_values(&self, _context: &ValueContext, _leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(ConstValues::boxed(self.description(), Constant::Double(self.constant)))
    }

    fn description(&self) -> String {
        self.constant.to_string()
    }
}

/// `literal(s)`: a string constant. It has no numeric value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralValueSource {
    string: String,
}

impl LiteralValueSource {
    pub fn new(string: impl Into<String>) -> Self {
        LiteralValueSource { string: string.into() }
    }
}

impl ValueSource for LiteralValueSource {
    fn get_values(&self, _context: &ValueContext, _leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(Box::new(LiteralValues {
            description: self.description(),
            string: self.string.clone(),
        }))
    }

    fn description(&self) -> String {
        format!("literal({})", self.string)
    }
}

#[derive(Debug)]
struct LiteralValues {
    description: String,
    string: String,
}

impl FunctionValues for LiteralValues {
    fn double_val(&mut self, _doc: i32) -> Result<f64> {
        Err(XiphosError::unsupported(format!("{} has no numeric value", self.description)))
    }

    fn bool_val(&mut self, _doc: i32) -> Result<bool> {
        Ok(!self.string.is_empty())
    }

    fn str_val(&mut self, _doc: i32) -> Result<Option<String>> {
        Ok(Some(self.string.clone()))
    }

    fn describe(&mut self, _doc: i32) -> Result<String> {
        Ok(self.description.clone())
    }

    fn fill_value(&mut self, _doc: i32, value: &mut MutableValue) -> Result<()> {
        *value = MutableValue::Str(self.string.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::Document;
    use crate::search::function::test_support;

    #[test]
    fn test_constants_ignore_the_document() {
        let searcher = test_support::searcher(&[vec![Document::new(), Document::new()]]);
        let context = ValueContext::new(&searcher);
        let leaf = &searcher.leaves()[0];

        let source = ConstValueSource::new(2.5);
        let mut values = source.get_values(&context, leaf).unwrap();
        assert_eq!(values.float_val(0).unwrap(), 2.5);
        assert_eq!(values.float_val(1).unwrap(), 2.5);
        assert_eq!(values.int_val(1).unwrap(), 2);
        assert!(values.exists(1).unwrap());
        assert_eq!(values.describe(0).unwrap(), "const(2.5)=2.5");

        let mut values = DoubleConstValueSource::new(0.0).get_values(&context, leaf).unwrap();
        assert!(!values.bool_val(0).unwrap());

        let mut values = LiteralValueSource::new("abc").get_values(&context, leaf).unwrap();
        assert_eq!(values.str_val(0).unwrap().as_deref(), Some("abc"));
        assert_eq!(values.bytes_val(0).unwrap(), Some(b"abc".to_vec()));
        assert!(matches!(values.float_val(0), Err(XiphosError::Unsupported(_))));
    }
}
