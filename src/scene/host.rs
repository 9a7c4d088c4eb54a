//! The host-application view the registry reads objects from.

use crate::core::AttributeSource;
use crate::data::CustomGeometry;
use crate::util::DMat4;

/// One shape instance at the sample being inserted.
pub trait HostObject {
    /// Full DAG path of this instance.
    fn path(&self) -> &str;

    /// Identity of the underlying shape, equal for all of its instance paths.
    fn object_id(&self) -> &str {
        self.path()
    }

    /// Index of this path among the shape's instances.
    fn instance_number(&self) -> usize {
        0
    }

    /// World matrix of every instance path of the shape, by instance number.
    fn instance_matrices(&self) -> Vec<DMat4>;

    /// Matrix of the node relative to its parent, used when an explicit
    /// instancing matrix is combined with it.
    fn exclusive_matrix(&self) -> DMat4 {
        DMat4::IDENTITY
    }

    /// Geometry attributes of the shape.
    fn shape_attributes(&self) -> &dyn AttributeSource;

    /// Render attributes gathered from the shape's transform.
    fn node_attributes(&self) -> &dyn AttributeSource;

    /// Geometry writer for custom shapes.
    fn custom_geometry(&self) -> Option<Box<dyn CustomGeometry>> {
        None
    }
}
