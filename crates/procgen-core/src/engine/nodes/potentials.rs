use super::NodeView;
use crate::core::models::potentials::{ExternalPotential, PotentialForm, PotentialGeometry};
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::ids::NodeId;
use crate::engine::keywords::{KeywordStore, KeywordValue, defaults};
use crate::engine::node::PICK_NODES;
use crate::engine::procedure::Procedure;
use nalgebra::{Point3, Vector3};
use tracing::debug;

fn with_form(store: KeywordStore) -> KeywordStore {
    store
        .add(
            "Potential",
            "Functional form of the potential",
            defaults::option(PotentialForm::KEYWORDS, "Harmonic"),
        )
        .add("ForceConstant", "Force constant of the potential", defaults::double(10.0))
}

fn with_origin(store: KeywordStore) -> KeywordStore {
    store
        .add("Origin", "Origin of the potential", defaults::vec3(0.0, 0.0, 0.0))
        .add(
            "OriginIsFractional",
            "Whether the origin is given in fractional coordinates",
            KeywordValue::Bool(false),
        )
        .add("Radius", "Radius at which the potential takes effect", defaults::double(5.0))
}

pub(super) fn spherical_keywords() -> KeywordStore {
    with_form(with_origin(KeywordStore::new()))
}

pub(super) fn cylindrical_keywords() -> KeywordStore {
    with_form(with_origin(KeywordStore::new()).add(
        "Vector",
        "Direction of the cylinder axis",
        defaults::vec3(0.0, 0.0, 1.0),
    ))
}

pub(super) fn regional_keywords() -> KeywordStore {
    with_form(
        KeywordStore::new()
            .add(
                "Expression",
                "Expression over x, y and z describing the region",
                defaults::expression(),
            )
            .add("Minimum", "Lowest value considered inside", defaults::double(0.0))
            .add("Maximum", "Highest value considered inside", defaults::double(1.0)),
    )
}

pub(super) fn restraint_keywords() -> KeywordStore {
    KeywordStore::new()
        .add(
            "Species",
            "Species whose atoms are restrained",
            KeywordValue::SpeciesVector(Vec::new()),
        )
        .add(
            "Selection",
            "Picked molecules whose atoms are restrained",
            defaults::node(PICK_NODES, "selection"),
        )
        .add("ForceConstant", "Force constant of the restraint", defaults::double(10.0))
}

fn form(view: &NodeView) -> Result<(PotentialForm, f64), NodeError> {
    let keyword = view.option("Potential")?;
    let form = PotentialForm::from_keyword(keyword)
        .ok_or_else(|| view.keyword_error("Potential", format!("unknown potential form '{}'", keyword)))?;
    Ok((form, view.double("ForceConstant")?))
}

/// The origin in real coordinates, converting from fractional if requested.
fn origin(view: &NodeView, ctx: ProcedureContext) -> Result<Point3<f64>, NodeError> {
    let origin = view.vec3("Origin")?;
    Ok(if view.flag("OriginIsFractional") {
        ctx.configuration.borrow().simbox().fractional_to_real(&origin)
    } else {
        Point3::from(origin)
    })
}

fn radius(view: &NodeView) -> Result<f64, NodeError> {
    let radius = view.double("Radius")?;
    if radius < 0.0 {
        return Err(view.keyword_error("Radius", format!("radius must not be negative, got {}", radius)));
    }
    Ok(radius)
}

fn attach(view: &NodeView, ctx: ProcedureContext, potential: ExternalPotential) {
    debug!(node = %view.node().label(), form = ?potential.form, "Adding external potential");
    ctx.configuration.borrow_mut().add_potential(potential);
}

pub(super) fn execute_spherical(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let view = NodeView::new(procedure, id)?;
    let (form, force_constant) = form(&view)?;
    let geometry = PotentialGeometry::Spherical {
        origin: origin(&view, ctx)?,
        radius: radius(&view)?,
    };
    attach(
        &view,
        ctx,
        ExternalPotential {
            geometry,
            form,
            force_constant,
        },
    );
    Ok(())
}

pub(super) fn execute_cylindrical(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let view = NodeView::new(procedure, id)?;
    let (form, force_constant) = form(&view)?;
    let vector: Vector3<f64> = view.vec3("Vector")?;
    if vector.norm() < 1e-12 {
        return Err(view.keyword_error("Vector", "axis vector must be non-zero"));
    }
    let geometry = PotentialGeometry::Cylindrical {
        origin: origin(&view, ctx)?,
        vector,
        radius: radius(&view)?,
    };
    attach(
        &view,
        ctx,
        ExternalPotential {
            geometry,
            form,
            force_constant,
        },
    );
    Ok(())
}

pub(super) fn execute_regional(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let view = NodeView::new(procedure, id)?;
    let (form, force_constant) = form(&view)?;
    let expression = view
        .node()
        .keywords
        .get_expression("Expression")
        .filter(|e| e.is_valid())
        .ok_or_else(|| view.keyword_error("Expression", "no expression given"))?;
    let geometry = PotentialGeometry::Regional {
        expression: expression.text().to_string(),
        minimum: view.double("Minimum")?,
        maximum: view.double("Maximum")?,
    };
    attach(
        &view,
        ctx,
        ExternalPotential {
            geometry,
            form,
            force_constant,
        },
    );
    Ok(())
}

/// Tethers every atom of the chosen molecules to where it is now.
pub(super) fn execute_restraint(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let view = NodeView::new(procedure, id)?;
    let force_constant = view.double("ForceConstant")?;
    let (molecules, anchors) = {
        let configuration = ctx.configuration.borrow();
        let molecules = view.chosen_molecules("Species", "Selection", &configuration)?;
        let anchors: Vec<Point3<f64>> = molecules
            .iter()
            .filter_map(|&m| configuration.molecule(m))
            .flat_map(|m| m.positions.iter().copied())
            .collect();
        (molecules, anchors)
    };
    attach(
        &view,
        ctx,
        ExternalPotential {
            geometry: PotentialGeometry::Restraint { molecules, anchors },
            form: PotentialForm::Harmonic,
            force_constant,
        },
    );
    Ok(())
}
