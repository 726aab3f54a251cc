//! Arithmetic over child sources.
//!
//! Every function here produces a float. The bound children and the
//! operation travel together in one evaluator, [`FloatValues`], which derives
//! all other accessors from `float_val`.

use std::sync::Arc;

use crate::codec::NO_MORE_DOCS;
use crate::error::Result;
use crate::index::reader::LeafReaderContext;
use crate::search::function::{
    FunctionValues, ValueContext, ValueSource, create_weights, describe_all, values_of,
};
use crate::search::query::{AllDocsIterator, DocIdSetIterator};
use crate::search::searcher::IndexSearcher;

/// Reduction applied by a [`MultiFloatFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiOp {
    Sum,
    Product,
    Max,
    Min,
}

impl MultiOp {
    fn name(self) -> &'static str {
        match self {
            MultiOp::Sum => "sum",
            MultiOp::Product => "product",
            MultiOp::Max => "max",
            MultiOp::Min => "min",
        }
    }
}

/// Function of one argument applied by a [`SimpleFloatFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Abs,
    Sqrt,
    /// Base 10.
    Log,
    Ln,
    Exp,
}

impl UnaryOp {
    fn name(self) -> &'static str {
        match self {
            UnaryOp::Abs => "abs",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Log => "log",
            UnaryOp::Ln => "ln",
            UnaryOp::Exp => "exp",
        }
    }

    fn apply(self, v: f32) -> f32 {
        match self {
            UnaryOp::Abs => v.abs(),
            UnaryOp::Sqrt => v.sqrt(),
            UnaryOp::Log => v.log10(),
            UnaryOp::Ln => v.ln(),
            UnaryOp::Exp => v.exp(),
        }
    }
}

/// Function of two arguments applied by a [`DualFloatFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DualOp {
    Pow,
    Div,
}

impl DualOp {
    fn name(self) -> &'static str {
        match self {
            DualOp::Pow => "pow",
            DualOp::Div => "div",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FloatOp {
    Multi(MultiOp),
    Unary(UnaryOp),
    Dual(DualOp),
    Linear { slope: f32, intercept: f32 },
    Reciprocal { m: f32, a: f32, b: f32 },
    /// Children are the source, the target and an optional default.
    RangeMap { min: f32, max: f32 },
    Scale { min: f32, scale: f32, min_value: f32 },
}

impl FloatOp {
    /// Whether the result exists only where every child does.
    fn needs_all(self) -> bool {
        matches!(self, FloatOp::Multi(_) | FloatOp::Dual(_))
    }
}

#[derive(Debug)]
struct FloatValues {
    description: String,
    op: FloatOp,
    values: Vec<Box<dyn FunctionValues>>,
}

impl FloatValues {
    fn boxed(description: String, op: FloatOp, values: Vec<Box<dyn FunctionValues>>) -> Box<dyn FunctionValues> {
        Box::new(FloatValues {
            description,
            op,
            values,
        })
    }
}

impl FunctionValues for FloatValues {
    fn double_val(&mut self, doc: i32) -> Result<f64> {
        Ok(self.float_val(doc)? as f64)
    }

    fn float_val(&mut self, doc: i32) -> Result<f32> {
        let values = &mut self.values;
        Ok(match self.op {
            FloatOp::Multi(op) => {
                let mut acc: Option<f32> = None;
                for child in values.iter_mut() {
                    let v = child.float_val(doc)?;
                    acc = Some(match (op, acc) {
                        (_, None) => v,
                        (MultiOp::Sum, Some(a)) => a + v,
                        (MultiOp::Product, Some(a)) => a * v,
                        (MultiOp::Max, Some(a)) => a.max(v),
                        (MultiOp::Min, Some(a)) => a.min(v),
                    });
                }
                match (op, acc) {
                    (_, Some(v)) => v,
                    (MultiOp::Product, None) => 1.0,
                    (_, None) => 0.0,
                }
            }
            FloatOp::Unary(op) => op.apply(values[0].float_val(doc)?),
            FloatOp::Dual(op) => {
                let a = values[0].float_val(doc)?;
                let b = values[1].float_val(doc)?;
                match op {
                    DualOp::Pow => a.powf(b),
                    DualOp::Div => a / b,
                }
            }
            FloatOp::Linear { slope, intercept } => values[0].float_val(doc)? * slope + intercept,
            FloatOp::Reciprocal { m, a, b } => a / (m * values[0].float_val(doc)? + b),
            FloatOp::RangeMap { min, max } => {
                let v = values[0].float_val(doc)?;
                if v >= min && v <= max {
                    values[1].float_val(doc)?
                } else if let Some(default) = values.get_mut(2) {
                    default.float_val(doc)?
                } else {
                    v
                }
            }
            FloatOp::Scale {
                min,
                scale,
                min_value,
            } => (values[0].float_val(doc)? - min_value) * scale + min,
        })
    }

    fn exists(&mut self, doc: i32) -> Result<bool> {
        if !self.op.needs_all() {
            return match self.values.first_mut() {
                Some(values) => values.exists(doc),
                None => Ok(true),
            };
        }
        for values in &mut self.values {
            if !values.exists(doc)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn describe(&mut self, doc: i32) -> Result<String> {
        let val = self.float_val(doc)?;
        Ok(format!("{}={}", self.description, val))
    }
}

/// `sum`, `product`, `max` and `min` over any number of children.
#[derive(Debug, Clone)]
pub struct MultiFloatFunction {
    op: MultiOp,
    sources: Vec<Arc<dyn ValueSource>>,
}

impl MultiFloatFunction {
    pub fn new(op: MultiOp, sources: Vec<Arc<dyn ValueSource>>) -> Self {
        MultiFloatFunction { op, sources }
    }
}

impl ValueSource for MultiFloatFunction {
    fn create_weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        create_weights(&self.sources, context, searcher)
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(FloatValues::boxed(
            self.description(),
            FloatOp::Multi(self.op),
            values_of(&self.sources, context, leaf)?,
        ))
    }

    fn description(&self) -> String {
        format!("{}({})", self.op.name(), describe_all(&self.sources))
    }
}

/// `abs`, `sqrt`, `log`, `ln` and `exp` of one child.
#[derive(Debug, Clone)]
pub struct SimpleFloatFunction {
    op: UnaryOp,
    source: Arc<dyn ValueSource>,
}

impl SimpleFloatFunction {
    pub fn new(op: UnaryOp, source: Arc<dyn ValueSource>) -> Self {
        SimpleFloatFunction { op, source }
    }
}

impl ValueSource for SimpleFloatFunction {
    fn create_weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        self.source.create_weight(context, searcher)
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(FloatValues::boxed(
            self.description(),
            FloatOp::Unary(self.op),
            vec![self.source.get_values(context, leaf)?],
        ))
    }

    fn description(&self) -> String {
        format!("{}({})", self.op.name(), self.source.description())
    }
}

/// `pow(a, b)` and `div(a, b)`.
#[derive(Debug, Clone)]
pub struct DualFloatFunction {
    op: DualOp,
    a: Arc<dyn ValueSource>,
    b: Arc<dyn ValueSource>,
}

impl DualFloatFunction {
    pub fn new(op: DualOp, a: Arc<dyn ValueSource>, b: Arc<dyn ValueSource>) -> Self {
        DualFloatFunction { op, a, b }
    }
}

impl ValueSource for DualFloatFunction {
    fn create_weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        self.a.create_weight(context, searcher)?;
        self.b.create_weight(context, searcher)
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(FloatValues::boxed(
            self.description(),
            FloatOp::Dual(self.op),
            vec![self.a.get_values(context, leaf)?, self.b.get_values(context, leaf)?],
        ))
    }

    fn description(&self) -> String {
        format!("{}({},{})", self.op.name(), self.a.description(), self.b.description())
    }
}

/// `linear(x, m, c)`: `m * x + c`.
#[derive(Debug, Clone)]
pub struct LinearFloatFunction {
    source: Arc<dyn ValueSource>,
    slope: f32,
    intercept: f32,
}

impl LinearFloatFunction {
    pub fn new(source: Arc<dyn ValueSource>, slope: f32, intercept: f32) -> Self {
        LinearFloatFunction {
            source,
            slope,
            intercept,
        }
    }
}

impl ValueSource for LinearFloatFunction {
    fn create_weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        self.source.create_weight(context, searcher)
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(FloatValues::boxed(
            self.description(),
            FloatOp::Linear {
                slope: self.slope,
                intercept: self.intercept,
            },
            vec![self.source.get_values(context, leaf)?],
        ))
    }

    fn description(&self) -> String {
        format!("{}*{}+{}", self.slope, self.source.description(), self.intercept)
    }
}

/// `recip(x, m, a, b)`: `a / (m * x + b)`.
#[derive(Debug, Clone)]
pub struct ReciprocalFloatFunction {
    source: Arc<dyn ValueSource>,
    m: f32,
    a: f32,
    b: f32,
}

impl ReciprocalFloatFunction {
    pub fn new(source: Arc<dyn ValueSource>, m: f32, a: f32, b: f32) -> Self {
        ReciprocalFloatFunction { source, m, a, b }
    }
}

impl ValueSource for ReciprocalFloatFunction {
    fn create_weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        self.source.create_weight(context, searcher)
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        Ok(FloatValues::boxed(
            self.description(),
            FloatOp::Reciprocal {
                m: self.m,
                a: self.a,
                b: self.b,
            },
            vec![self.source.get_values(context, leaf)?],
        ))
    }

    fn description(&self) -> String {
        format!("{}/({}*{}+{})", self.a, self.m, self.source.description(), self.b)
    }
}

/// `map(x, min, max, target[, default])`: `target` where `min <= x <= max`,
/// otherwise `default`, or `x` itself without a default.
#[derive(Debug, Clone)]
pub struct RangeMapFloatFunction {
    source: Arc<dyn ValueSource>,
    min: f32,
    max: f32,
    target: Arc<dyn ValueSource>,
    default: Option<Arc<dyn ValueSource>>,
}

impl RangeMapFloatFunction {
    pub fn new(
        source: Arc<dyn ValueSource>,
        min: f32,
        max: f32,
        target: Arc<dyn ValueSource>,
        default: Option<Arc<dyn ValueSource>>,
    ) -> Self {
        RangeMapFloatFunction {
            source,
            min,
            max,
            target,
            default,
        }
    }
}

impl ValueSource for RangeMapFloatFunction {
    fn create_weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        self.source.create_weight(context, searcher)?;
        self.target.create_weight(context, searcher)?;
        if let Some(default) = &self.default {
            default.create_weight(context, searcher)?;
        }
        Ok(())
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        let mut values = vec![
            self.source.get_values(context, leaf)?,
            self.target.get_values(context, leaf)?,
        ];
        if let Some(default) = &self.default {
            values.push(default.get_values(context, leaf)?);
        }
        Ok(FloatValues::boxed(
            self.description(),
            FloatOp::RangeMap {
                min: self.min,
                max: self.max,
            },
            values,
        ))
    }

    fn description(&self) -> String {
        let default = self
            .default
            .as_ref()
            .map_or_else(|| "null".to_string(), |d| d.description());
        format!(
            "map({},{},{},{},{})",
            self.source.description(),
            self.min,
            self.max,
            self.target.description(),
            default
        )
    }
}

/// Bounds of a scaled source over every document of the top-level reader.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ScaleInfo {
    min_value: f32,
    max_value: f32,
}

/// `scale(x, min, max)`: maps the range of `x` over the whole index linearly
/// onto `[min, max]`. Documents without a value and non-finite values do not
/// contribute to the range.
#[derive(Debug, Clone)]
pub struct ScaleFloatFunction {
    source: Arc<dyn ValueSource>,
    min: f32,
    max: f32,
}

impl ScaleFloatFunction {
    pub fn new(source: Arc<dyn ValueSource>, min: f32, max: f32) -> Self {
        ScaleFloatFunction { source, min, max }
    }

    fn scale_info(&self, context: &ValueContext) -> Result<Arc<ScaleInfo>> {
        context.get_or_try_insert_with(self, || {
            let mut min_value = f32::INFINITY;
            let mut max_value = f32::NEG_INFINITY;
            for leaf in context.searcher().leaves() {
                let mut values = self.source.get_values(context, &leaf)?;
                let mut docs = AllDocsIterator::new(leaf.reader().max_doc(), None);
                loop {
                    let doc = docs.next_doc()?;
                    if doc == NO_MORE_DOCS {
                        break;
                    }
                    if !values.exists(doc)? {
                        continue;
                    }
                    let v = values.float_val(doc)?;
                    if !v.is_finite() {
                        continue;
                    }
                    min_value = min_value.min(v);
                    max_value = max_value.max(v);
                }
            }
            if min_value > max_value {
                min_value = 0.0;
                max_value = 0.0;
            }
            log::debug!("{} spans [{min_value}, {max_value}]", self.source.description());
            Ok(ScaleInfo {
                min_value,
                max_value,
            })
        })
    }
}

impl ValueSource for ScaleFloatFunction {
    fn create_weight(&self, context: &ValueContext, searcher: &IndexSearcher) -> Result<()> {
        self.source.create_weight(context, searcher)?;
        self.scale_info(context).map(|_| ())
    }

    fn get_values(&self, context: &ValueContext, leaf: &LeafReaderContext) -> Result<Box<dyn FunctionValues>> {
        let info = self.scale_info(context)?;
        let span = info.max_value - info.min_value;
        let scale = if span == 0.0 { 0.0 } else { (self.max - self.min) / span };
        Ok(FloatValues::boxed(
            self.description(),
            FloatOp::Scale {
                min: self.min,
                scale,
                min_value: info.min_value,
            },
            vec![self.source.get_values(context, leaf)?],
        ))
    }

    fn description(&self) -> String {
        format!("scale({},{},{})", self.source.description(), self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::{Document, Field};
    use crate::search::function::test_support;
    use crate::search::function::{ConstValueSource, NumericFieldSource};

    fn constant(v: f32) -> Arc<dyn ValueSource> {
        Arc::new(ConstValueSource::new(v))
    }

    fn eval(source: &dyn ValueSource, docs: usize) -> Vec<f32> {
        let searcher = test_support::searcher(&[(0..docs).map(|_| Document::new()).collect()]);
        let context = ValueContext::new(&searcher);
        source.create_weight(&context, &searcher).unwrap();
        let mut values = source.get_values(&context, &searcher.leaves()[0]).unwrap();
        (0..docs as i32).map(|doc| values.float_val(doc).unwrap()).collect()
    }

    #[test]
    fn test_multi_functions() {
        let args = vec![constant(2.0), constant(3.0), constant(-1.0)];
        assert_eq!(eval(&MultiFloatFunction::new(MultiOp::Sum, args.clone()), 1), vec![4.0]);
        assert_eq!(eval(&MultiFloatFunction::new(MultiOp::Product, args.clone()), 1), vec![-6.0]);
        assert_eq!(eval(&MultiFloatFunction::new(MultiOp::Max, args.clone()), 1), vec![3.0]);
        assert_eq!(eval(&MultiFloatFunction::new(MultiOp::Min, args.clone()), 1), vec![-1.0]);
        assert_eq!(
            MultiFloatFunction::new(MultiOp::Sum, args).description(),
            "sum(const(2),const(3),const(-1))"
        );
    }

    #[test]
    fn test_transforms() {
        assert_eq!(eval(&LinearFloatFunction::new(constant(2.0), 3.0, 1.0), 1), vec![7.0]);
        assert_eq!(eval(&ReciprocalFloatFunction::new(constant(1.0), 1.0, 10.0, 4.0), 1), vec![2.0]);
        assert_eq!(
            eval(&DualFloatFunction::new(DualOp::Pow, constant(2.0), constant(3.0)), 1),
            vec![8.0]
        );
        assert_eq!(
            eval(&DualFloatFunction::new(DualOp::Div, constant(1.0), constant(4.0)), 1),
            vec![0.25]
        );
        assert_eq!(eval(&SimpleFloatFunction::new(UnaryOp::Abs, constant(-2.0)), 1), vec![2.0]);
        assert_eq!(eval(&SimpleFloatFunction::new(UnaryOp::Sqrt, constant(9.0)), 1), vec![3.0]);
        assert_eq!(eval(&SimpleFloatFunction::new(UnaryOp::Log, constant(100.0)), 1), vec![2.0]);
        assert_eq!(eval(&SimpleFloatFunction::new(UnaryOp::Exp, constant(0.0)), 1), vec![1.0]);
    }

    #[test]
    fn test_range_map() {
        let inside = RangeMapFloatFunction::new(constant(5.0), 0.0, 10.0, constant(1.0), Some(constant(-1.0)));
        assert_eq!(eval(&inside, 1), vec![1.0]);
        let outside = RangeMapFloatFunction::new(constant(50.0), 0.0, 10.0, constant(1.0), Some(constant(-1.0)));
        assert_eq!(eval(&outside, 1), vec![-1.0]);
        let passthrough = RangeMapFloatFunction::new(constant(50.0), 0.0, 10.0, constant(1.0), None);
        assert_eq!(eval(&passthrough, 1), vec![50.0]);
    }

    #[test]
    fn test_scale_spans_every_leaf() {
        let searcher = test_support::searcher(&[
            vec![
                Document::new().with(Field::long("x", 10, false)),
                Document::new(),
            ],
            vec![Document::new().with(Field::long("x", 30, false))],
        ]);
        let scale = ScaleFloatFunction::new(Arc::new(NumericFieldSource::long("x")), 0.0, 1.0);
        let context = ValueContext::new(&searcher);
        scale.create_weight(&context, &searcher).unwrap();
        let leaves = searcher.leaves();

        let mut first = scale.get_values(&context, &leaves[0]).unwrap();
        assert_eq!(first.float_val(0).unwrap(), 0.0);
        // The document without a value still maps through the global range.
        assert_eq!(first.float_val(1).unwrap(), -0.5);
        let mut second = scale.get_values(&context, &leaves[1]).unwrap();
        assert_eq!(second.float_val(0).unwrap(), 1.0);

        let info = context.get::<ScaleInfo>(&scale).unwrap();
        assert_eq!(
            *info,
            ScaleInfo {
                min_value: 10.0,
                max_value: 30.0
            }
        );
    }

    #[test]
    fn test_scale_of_constant_is_min() {
        let scale = ScaleFloatFunction::new(constant(7.0), 2.0, 5.0);
        assert_eq!(eval(&scale, 2), vec![2.0, 2.0]);
    }
}
