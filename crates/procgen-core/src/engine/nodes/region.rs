use super::{NodeView, set_state};
use crate::core::expression::ExpressionValue;
use crate::core::models::region::{Region, voxel_grid};
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::ids::NodeId;
use crate::engine::keywords::{KeywordStore, defaults};
use crate::engine::node::NodeState;
use crate::engine::procedure::Procedure;
use nalgebra::Point3;
use tracing::debug;

fn with_voxel_size(store: KeywordStore) -> KeywordStore {
    store.add(
        "VoxelSize",
        "Approximate side length of the region voxels",
        defaults::double(1.0),
    )
}

pub(super) fn custom_keywords() -> KeywordStore {
    with_voxel_size(
        KeywordStore::new()
            .add(
                "Expression",
                "Expression over x, y and z evaluated at each voxel centre",
                defaults::expression(),
            )
            .add("Minimum", "Lowest value considered inside", defaults::double(0.0))
            .add("Maximum", "Highest value considered inside", defaults::double(1.0)),
    )
}

pub(super) fn cylindrical_keywords() -> KeywordStore {
    with_voxel_size(
        KeywordStore::new()
            .add(
                "OriginFrac",
                "Point on the cylinder axis, in fractional coordinates",
                defaults::vec3(0.0, 0.0, 0.0),
            )
            .add("Vector", "Direction of the cylinder axis", defaults::vec3(0.0, 0.0, 1.0))
            .add("Radius", "Cylinder radius", defaults::double(5.0)),
    )
}

pub(super) fn general_keywords() -> KeywordStore {
    with_voxel_size(KeywordStore::new().add(
        "Tolerance",
        "Minimum distance between a free voxel centre and any atom",
        defaults::double(2.0),
    ))
}

fn voxel_size(view: &NodeView) -> Result<f64, NodeError> {
    let size = view.double("VoxelSize")?;
    if size <= 0.0 {
        return Err(view.keyword_error("VoxelSize", format!("voxel size must be positive, got {}", size)));
    }
    Ok(size)
}

fn store_region(procedure: &mut Procedure, id: NodeId, region: Region) -> Result<(), NodeError> {
    debug!(
        node = %procedure.try_node(id)?.label(),
        voxels = region.n_voxels(),
        free = region.n_free_voxels(),
        "Region generated"
    );
    set_state(procedure, id, NodeState::Region(Some(region)))
}

pub(super) fn execute_custom(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let region = {
        let view = NodeView::new(procedure, id)?;
        let size = voxel_size(&view)?;
        let minimum = view.double("Minimum")?;
        let maximum = view.double("Maximum")?;
        let mut expression = view
            .node()
            .keywords
            .get_expression("Expression")
            .filter(|e| e.is_valid())
            .cloned()
            .ok_or_else(|| view.keyword_error("Expression", "no expression given"))?;

        let simbox = ctx.configuration.borrow().simbox().clone();
        let (_, centres) = voxel_grid(&simbox, size);
        let variables = view.variables();
        let mut inside = Vec::with_capacity(centres.len());
        for centre in &centres {
            for (axis, value) in ["x", "y", "z"].into_iter().zip(centre.iter()) {
                expression.set_local(axis, ExpressionValue::Double(*value));
            }
            let value = expression
                .as_double(&variables)
                .map_err(|e| view.keyword_error("Expression", e.to_string()))?;
            inside.push(value >= minimum && value <= maximum);
        }
        Region::from_flags(&simbox, size, inside)
            .ok_or_else(|| view.error("voxel flags do not match the grid"))?
    };
    store_region(procedure, id, region)
}

pub(super) fn execute_cylindrical(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let region = {
        let view = NodeView::new(procedure, id)?;
        let size = voxel_size(&view)?;
        let radius = view.double("Radius")?;
        let axis = view
            .vec3("Vector")?
            .try_normalize(1e-12)
            .ok_or_else(|| view.keyword_error("Vector", "axis vector must be non-zero"))?;

        let simbox = ctx.configuration.borrow().simbox().clone();
        let origin = simbox.fractional_to_real(&view.vec3("OriginFrac")?);
        Region::build(&simbox, size, |p| {
            let v = simbox.minimum_vector(&origin, p);
            (v - axis * v.dot(&axis)).norm() <= radius
        })
    };
    store_region(procedure, id, region)
}

/// Free space: voxels whose centre is further than `Tolerance` from every atom.
pub(super) fn execute_general(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let region = {
        let view = NodeView::new(procedure, id)?;
        let size = voxel_size(&view)?;
        let tolerance = view.double("Tolerance")?;

        let configuration = ctx.configuration.borrow();
        let simbox = configuration.simbox().clone();
        let atoms: Vec<Point3<f64>> = configuration.atom_positions();
        drop(configuration);

        let (_, centres) = voxel_grid(&simbox, size);
        let inside = ctx.pool.map(&centres, |centre| {
            atoms
                .iter()
                .all(|atom| simbox.minimum_distance(centre, atom) > tolerance)
        });
        Region::from_flags(&simbox, size, inside)
            .ok_or_else(|| view.error("voxel flags do not match the grid"))?
    };
    store_region(procedure, id, region)
}

#[cfg(test)]
mod tests {
    use super::super::region_of;
    use super::super::test_support::*;
    use crate::core::models::configuration::Molecule;
    use crate::core::models::simbox::SimBox;
    use crate::core::models::species::test_species::argon;
    use crate::engine::node::{NodeType, NodeUsage};
    use nalgebra::Point3;

    fn with_box(length: f64) -> Harness {
        let h = Harness::new(NodeUsage::Generation);
        h.configuration.borrow_mut().set_simbox(SimBox::cubic(length));
        h
    }

    #[test]
    fn custom_region_keeps_voxels_within_value_range() {
        let mut h = with_box(10.0);
        let id = h.add(
            NodeType::CustomRegion,
            Some("Slab"),
            &[("Expression", &["z"]), ("Minimum", &["0"]), ("Maximum", &["2.0"])],
        );
        h.run().unwrap();
        let region = region_of(&h.procedure, id).unwrap();
        assert_eq!(region.n_voxels(), 1000);
        assert_eq!(region.n_free_voxels(), 200);
        assert!(region.contains(&Point3::new(5.0, 5.0, 1.0)));
        assert!(!region.contains(&Point3::new(5.0, 5.0, 6.0)));
    }

    #[test]
    fn custom_region_without_expression_fails() {
        let mut h = with_box(4.0);
        h.add(NodeType::CustomRegion, Some("Empty"), &[]);
        let err = h.run().unwrap_err();
        assert_eq!(err.keyword, Some("Expression"));
    }

    #[test]
    fn cylindrical_region_measures_distance_from_axis() {
        let mut h = with_box(10.0);
        let id = h.add(
            NodeType::CylindricalRegion,
            Some("Pore"),
            &[("OriginFrac", &["0.5", "0.5", "0.0"]), ("Radius", &["2.0"])],
        );
        h.run().unwrap();
        let region = region_of(&h.procedure, id).unwrap();
        assert!(region.contains(&Point3::new(5.5, 5.5, 9.0)));
        assert!(!region.contains(&Point3::new(1.5, 5.5, 9.0)));
    }

    #[test]
    fn zero_axis_vector_is_rejected() {
        let mut h = with_box(10.0);
        h.add(NodeType::CylindricalRegion, Some("Pore"), &[("Vector", &["0", "0", "0"])]);
        let err = h.run().unwrap_err();
        assert_eq!(err.keyword, Some("Vector"));
    }

    #[test]
    fn general_region_excludes_space_near_atoms() {
        let mut h = with_box(10.0);
        h.configuration
            .borrow_mut()
            .add_molecule(Molecule::from_species(&argon(), vec![Point3::new(5.5, 5.5, 5.5)]));
        let id = h.add(NodeType::GeneralRegion, Some("Free"), &[("Tolerance", &["0.9"])]);
        h.run().unwrap();
        let region = region_of(&h.procedure, id).unwrap();
        assert_eq!(region.n_free_voxels(), 999);
        assert!(!region.contains(&Point3::new(5.2, 5.7, 5.1)));
        assert!(region.contains(&Point3::new(0.5, 0.5, 0.5)));
    }
}
