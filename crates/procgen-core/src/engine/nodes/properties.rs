use super::NodeView;
use crate::core::models::simbox::SimBox;
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::ids::NodeId;
use crate::engine::keywords::{KeywordStore, KeywordValue, defaults};
use crate::engine::procedure::Procedure;
use tracing::debug;

pub(super) fn box_keywords() -> KeywordStore {
    KeywordStore::new()
        .add("Lengths", "Box axis lengths", defaults::vec3(1.0, 1.0, 1.0))
        .add("Angles", "Box axis angles in degrees", defaults::vec3(90.0, 90.0, 90.0))
        .add(
            "NonPeriodic",
            "Whether the box is non-periodic",
            KeywordValue::Bool(false),
        )
}

pub(super) fn temperature_keywords() -> KeywordStore {
    KeywordStore::new().add(
        "Temperature",
        "Temperature of the configuration in kelvin",
        defaults::double(300.0),
    )
}

pub(super) fn size_factor_keywords() -> KeywordStore {
    KeywordStore::new().add(
        "SizeFactor",
        "Factor by which the box and molecule separations are inflated",
        defaults::double(10.0),
    )
}

/// Replaces the box. Molecules keep their absolute coordinates.
pub(super) fn execute_box(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let view = NodeView::new(procedure, id)?;
    let lengths = view.vec3("Lengths")?;
    if lengths.iter().any(|l| *l <= 0.0) {
        return Err(view.keyword_error(
            "Lengths",
            format!(
                "box lengths must be positive, got {} {} {}",
                lengths.x, lengths.y, lengths.z
            ),
        ));
    }
    let angles = view.vec3("Angles")?;
    if angles.iter().any(|a| *a <= 0.0 || *a >= 180.0) {
        return Err(view.keyword_error("Angles", "box angles must lie strictly between 0 and 180 degrees"));
    }
    let simbox = SimBox::new(lengths)
        .with_angles(angles)
        .with_periodic(!view.flag("NonPeriodic"));
    debug!(volume = simbox.volume(), "Setting box");
    ctx.configuration.borrow_mut().set_simbox(simbox);
    Ok(())
}

pub(super) fn execute_temperature(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let view = NodeView::new(procedure, id)?;
    let temperature = view.double("Temperature")?;
    if temperature < 0.0 {
        return Err(view.keyword_error(
            "Temperature",
            format!("temperature must not be negative, got {}", temperature),
        ));
    }
    ctx.configuration.borrow_mut().set_temperature(temperature);
    Ok(())
}

pub(super) fn execute_size_factor(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let view = NodeView::new(procedure, id)?;
    let factor = view.double("SizeFactor")?;
    if factor < 1.0 {
        return Err(view.keyword_error(
            "SizeFactor",
            format!("size factor must be at least 1, got {}", factor),
        ));
    }
    ctx.configuration.borrow_mut().set_size_factor(factor);
    Ok(())
}
