use crate::{
    error::Result,
    graph::{
        node::{GraphNode, Modulatable},
        param::ParamValue,
    },
};

/// Fluent construction helpers.
///
/// ```ignore
/// let verb = MatrixVerb::new(&config, osc)
///     .with(MatrixVerbParam::Liveness, 0.9)?
///     .modulate(MatrixVerbParam::Balance, LfoNode::sine(0.2).range(0.2, 0.6))?;
/// ```
pub trait NodeExt: GraphNode + Sized {
    /// Set `param` and hand the node back.
    fn with(mut self, param: <Self as Modulatable>::Param, value: impl Into<ParamValue>) -> Result<Self>
    where
        Self: Modulatable,
    {
        self.set(param, value)?;
        Ok(self)
    }

    /// Drive `param` from another node's output.
    fn modulate<S: GraphNode + 'static>(self, param: <Self as Modulatable>::Param, source: S) -> Result<Self>
    where
        Self: Modulatable,
    {
        self.with(param, ParamValue::signal(source))
    }

    fn boxed(self) -> Box<dyn GraphNode>
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<T: GraphNode> NodeExt for T {}
