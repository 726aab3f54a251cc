//! Conditional and boolean functions.

use std::sync::Arc;

use crate::error::{Result, XiphosError};
use crate::index::reader::LeafReaderContext;
use crate::search::function::{
    FunctionValues, MutableValue, ValueContext, ValueSource, create_weights, describe_all, values_of,
};
use crate::search::searcher::IndexSearcher;

/// `def(a, b, ...)`: the value of the first child that exists for the
/// document, or of the last child when none does.
#[derive(Debug, Clone)]
pub struct DefFunction {
    sources: Vec<Arc<dyn ValueSource>>,
}

impl DefFunction {
    pub fn new(sources: Vec<Arc<dyn ValueSource>>) -> Result<Self> {
        if sources.is_empty() {
            return Err(XiphosError::invalid_argument("def needs at least one argument"));
        }
        Ok(DefFunction { sources })
    }
}

impl ValueSource for DefFunction {
    fn create_weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        create_weights(&self.sources, context, searcher)
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(Box::new(DefValues {
            values: values_of(&self.sources, context, leaf)?,
        }))
    }

    fn description(&self) -> String {
        format!("def({})", describe_all(&self.sources))
    }
}

#[derive(Debug)]
struct DefValues {
    values: Vec<Box<dyn FunctionValues>>,
}

impl DefValues {
    fn pick(&mut self, doc: i32) -> Result<&mut Box<dyn FunctionValues>> {
        let last = self.values.len() - 1;
        let mut chosen = last;
        for (i, values) in self.values.iter_mut().enumerate().take(last) {
            if values.exists(doc)? {
                chosen = i;
                break;
            }
        }
        Ok(&mut self.values[chosen])
    }
}

impl FunctionValues for DefValues {
    fn double_val(&mut self, doc: i32) -> Result<f64> {
        self.pick(doc)?.double_val(doc)
    }

    fn float_val(&mut self, doc: i32) -> Result<f32> {
        self.pick(doc)?.float_val(doc)
    }

    fn long_val(&mut self, doc: i32) -> Result<i64> {
        self.pick(doc)?.long_val(doc)
    }

    fn int_val(&mut self, doc: i32) -> Result<i32> {
        self.pick(doc)?.int_val(doc)
    }

    fn bool_val(&mut self, doc: i32) -> Result<bool> {
        self.pick(doc)?.bool_val(doc)
    }

    fn str_val(&mut self, doc: i32) -> Result<Option<String>> {
        self.pick(doc)?.str_val(doc)
    }

    fn bytes_val(&mut self, doc: i32) -> Result<Option<Vec<u8>>> {
        self.pick(doc)?.bytes_val(doc)
    }

    fn exists(&mut self, doc: i32) -> Result<bool> {
        for values in &mut self.values {
            if values.exists(doc)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn describe(&mut self, doc: i32) -> Result<String> {
        let mut parts = Vec::with_capacity(self.values.len());
        for values in &mut self.values {
            parts.push(values.describe(doc)?);
        }
        Ok(format!("def({})", parts.join(",")))
    }

    fn fill_value(&mut self, doc: i32, value: &mut MutableValue) -> Result<()> {
        self.pick(doc)?.fill_value(doc, value)
    }
}

/// `if(cond, a, b)`: `a` where `cond` is true for the document, else `b`.
/// Only the selected branch is evaluated.
#[derive(Debug, Clone)]
pub struct IfFunction {
    condition: Arc<dyn ValueSource>,
    if_true: Arc<dyn ValueSource>,
    if_false: Arc<dyn ValueSource>,
}

impl IfFunction {
    pub fn new(
        condition: Arc<dyn ValueSource>,
        if_true: Arc<dyn ValueSource>,
        if_false: Arc<dyn ValueSource>,
    ) -> Self {
        IfFunction {
            condition,
            if_true,
            if_false,
        }
    }
}

impl ValueSource for IfFunction {
    fn create_weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        self.condition.create_weight(context, searcher)?;
        self.if_true.create_weight(context, searcher)?;
        self.if_false.create_weight(context, searcher)
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(Box::new(IfValues {
            condition: self.condition.get_values(context, leaf)?,
            if_true: self.if_true.get_values(context, leaf)?,
            if_false: self.if_false.get_values(context, leaf)?,
        }))
    }

    fn description(&self) -> String {
        format!(
            "if({},{},{})",
            self.condition.description(),
            self.if_true.description(),
            self.if_false.description()
        )
    }
}

#[derive(Debug)]
struct IfValues {
    condition: Box<dyn FunctionValues>,
    if_true: Box<dyn FunctionValues>,
    if_false: Box<dyn FunctionValues>,
}

impl IfValues {
    fn branch(&mut self, doc: i32) -> Result<&mut Box<dyn FunctionValues>> {
        Ok(if self.condition.bool_val(doc)? {
            &mut self.if_true
        } else {
            &mut self.if_false
        })
    }
}

impl FunctionValues for IfValues {
    fn double_val(&mut self, doc: i32) -> Result<f64> {
        self.branch(doc)?.double_val(doc)
    }

    fn float_val(&mut self, doc: i32) -> Result<f32> {
        self.branch(doc)?.float_val(doc)
    }

    fn long_val(&mut self, doc: i32) -> Result<i64> {
        self.branch(doc)?.long_val(doc)
    }

    fn int_val(&mut self, doc: i32) -> Result<i32> {
        self.branch(doc)?.int_val(doc)
    }

    fn bool_val(&mut self, doc: i32) -> Result<bool> {
        self.branch(doc)?.bool_val(doc)
    }

    fn str_val(&mut self, doc: i32) -> Result<Option<String>> {
        self.branch(doc)?.str_val(doc)
    }

    fn bytes_val(&mut self, doc: i32) -> Result<Option<Vec<u8>>> {
        self.branch(doc)?.bytes_val(doc)
    }

    fn exists(&mut self, doc: i32) -> Result<bool> {
        self.branch(doc)?.exists(doc)
    }

    fn describe(&mut self, doc: i32) -> Result<String> {
        Ok(format!(
            "if({},{},{})",
            self.condition.describe(doc)?,
            self.if_true.describe(doc)?,
            self.if_false.describe(doc)?
        ))
    }

    fn fill_value(&mut self, doc: i32, value: &mut MutableValue) -> Result<()> {
        self.branch(doc)?.fill_value(doc, value)
    }
}

/// Combination rule of a [`MultiBoolFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// Every child is true.
    And,
    /// Some child is true.
    Or,
    /// Some children are true and some are false.
    Xor,
}

impl BoolOp {
    fn name(self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
            BoolOp::Xor => "xor",
        }
    }
}

/// `and`, `or` and `xor` over the boolean values of the children.
#[derive(Debug, Clone)]
pub struct MultiBoolFunction {
    op: BoolOp,
    sources: Vec<Arc<dyn ValueSource>>,
}

impl MultiBoolFunction {
    pub fn new(op: BoolOp, sources: Vec<Arc<dyn ValueSource>>) -> Self {
        MultiBoolFunction { op, sources }
    }
}

impl ValueSource for MultiBoolFunction {
    fn create_weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        create_weights(&self.sources, context, searcher)
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(Box::new(BoolValues {
            description: self.description(),
            values: values_of(&self.sources, context, leaf)?,
            rule: BoolRule::Multi(self.op),
        }))
    }

    fn description(&self) -> String {
        format!("{}({})", self.op.name(), describe_all(&self.sources))
    }
}

/// `not(x)`: the negated boolean value of `x`.
#[derive(Debug, Clone)]
pub struct NotFunction {
    source: Arc<dyn ValueSource>,
}

impl NotFunction {
    pub fn new(source: Arc<dyn ValueSource>) -> Self {
        NotFunction { source }
    }
}

impl ValueSource for NotFunction {
    fn create_weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        self.source.create_weight(context, searcher)
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(Box::new(BoolValues {
            description: self.description(),
            values: vec![self.source.get_values(context, leaf)?],
            rule: BoolRule::Not,
        }))
    }

    fn description(&self) -> String {
        format!("not({})", self.source.description())
    }
}

/// `exists(x)`: whether `x` has a value for the document.
#[derive(Debug, Clone)]
pub struct ExistsFunction {
    source: Arc<dyn ValueSource>,
}

impl ExistsFunction {
    pub fn new(source: Arc<dyn ValueSource>) -> Self {
        ExistsFunction { source }
    }
}

impl ValueSource for ExistsFunction {
    fn create_weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        self.source.create_weight(context, searcher)
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(Box::new(BoolValues {
            description: self.description(),
            values: vec![self.source.get_values(context, leaf)?],
            rule: BoolRule::Exists,
        }))
    }

    fn description(&self) -> String {
        format!("exists({})", self.source.description())
    }
}

#[derive(Debug, Clone, Copy)]
enum BoolRule {
    Multi(BoolOp),
    Not,
    Exists,
}

#[derive(Debug)]
struct BoolValues {
    description: String,
    values: Vec<Box<dyn FunctionValues>>,
    rule: BoolRule,
}

impl FunctionValues for BoolValues {
    fn bool_val(&mut self, doc: i32) -> Result<bool> {
        match self.rule {
            BoolRule::Multi(BoolOp::And) => {
                for values in &mut self.values {
                    if !values.bool_val(doc)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            BoolRule::Multi(BoolOp::Or) => {
                for values in &mut self.values {
                    if values.bool_val(doc)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            BoolRule::Multi(BoolOp::Xor) => {
                let mut num_true = 0;
                for values in &mut self.values {
                    if values.bool_val(doc)? {
                        num_true += 1;
                    }
                }
                Ok(num_true != 0 && num_true != self.values.len())
            }
            BoolRule::Not => Ok(!self.values[0].bool_val(doc)?),
            BoolRule::Exists => self.values[0].exists(doc),
        }
    }

    fn double_val(&mut self, doc: i32) -> Result<f64> {
        Ok(if self.bool_val(doc)? { 1.0 } else { 0.0 })
    }

    fn long_val(&mut self, doc: i32) -> Result<i64> {
        Ok(self.bool_val(doc)? as i64)
    }

    fn str_val(&mut self, doc: i32) -> Result<Option<String>> {
        Ok(Some(self.bool_val(doc)?.to_string()))
    }

    fn describe(&mut self, doc: i32) -> Result<String> {
        let val = self.bool_val(doc)?;
        Ok(format!("{}={}", self.description, val))
    }

    fn fill_value(&mut self, doc: i32, value: &mut MutableValue) -> Result<()> {
        *value = MutableValue::Bool(self.bool_val(doc)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::{Document, Field};
    use crate::search::function::test_support;
    use crate::search::function::{ConstValueSource, LiteralValueSource, NumericFieldSource};

    fn constant(v: f32) -> Arc<dyn ValueSource> {
        Arc::new(ConstValueSource::new(v))
    }

    #[test]
    fn test_def_falls_back_to_last() {
        let searcher = test_support::searcher(&[vec![
            Document::new().with(Field::long("x", 3, false)),
            Document::new(),
        ]]);
        let context = ValueContext::new(&searcher);
        let leaf = &searcher.leaves()[0];
        let def = DefFunction::new(vec![Arc::new(NumericFieldSource::long("x")) as Arc<dyn ValueSource>, constant(42.0)]).unwrap();
        let mut values = def.get_values(&context, leaf).unwrap();
        assert_eq!(values.long_val(0).unwrap(), 3);
        assert_eq!(values.long_val(1).unwrap(), 42);
        assert!(values.exists(1).unwrap());
        assert_eq!(def.description(), "def(long(x),const(42))");
        assert!(DefFunction::new(Vec::new()).is_err());
    }

    #[test]
    fn test_if_evaluates_only_selected_branch() {
        let searcher = test_support::searcher(&[vec![
            Document::new().with(Field::long("flag", 1, false)),
            Document::new(),
        ]]);
        let context = ValueContext::new(&searcher);
        let leaf = &searcher.leaves()[0];
        // A literal fails on any numeric access, so reaching it is an error.
        let choice = IfFunction::new(
            Arc::new(NumericFieldSource::long("flag")),
            constant(10.0),
            Arc::new(LiteralValueSource::new("boom")),
        );
        let mut values = choice.get_values(&context, leaf).unwrap();
        assert_eq!(values.float_val(0).unwrap(), 10.0);
        assert!(values.float_val(1).is_err());
    }

    #[test]
    fn test_boolean_combinators() {
        let searcher = test_support::searcher(&[vec![Document::new()]]);
        let context = ValueContext::new(&searcher);
        let leaf = &searcher.leaves()[0];
        let t = constant(1.0);
        let f = constant(0.0);

        let eval = |source: &dyn ValueSource| source.get_values(&context, leaf).unwrap().bool_val(0).unwrap();
        assert!(eval(&MultiBoolFunction::new(BoolOp::And, vec![t.clone(), t.clone()])));
        assert!(!eval(&MultiBoolFunction::new(BoolOp::And, vec![t.clone(), f.clone()])));
        assert!(eval(&MultiBoolFunction::new(BoolOp::Or, vec![f.clone(), t.clone()])));
        assert!(eval(&MultiBoolFunction::new(BoolOp::Xor, vec![f.clone(), t.clone()])));
        assert!(!eval(&MultiBoolFunction::new(BoolOp::Xor, vec![t.clone(), t.clone()])));
        assert!(eval(&NotFunction::new(f.clone())));
        assert!(eval(&ExistsFunction::new(f)));

        let mut values = NotFunction::new(t).get_values(&context, leaf).unwrap();
        assert_eq!(values.int_val(0).unwrap(), 0);
        assert_eq!(values.describe(0).unwrap(), "not(const(1))=false");
    }
}
