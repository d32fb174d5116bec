use super::{NodeView, current_site, set_state};
use crate::core::expression::ExpressionValue;
use crate::core::models::site::Site;
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::ids::NodeId;
use crate::engine::keywords::{KeywordStore, defaults};
use crate::engine::node::{NodeState, NodeType};
use crate::engine::procedure::Procedure;

const SITE_KEYWORDS: [&str; 3] = ["I", "J", "K"];

fn site_keywords(count: usize) -> KeywordStore {
    SITE_KEYWORDS[..count]
        .iter()
        .fold(KeywordStore::new(), |store, &keyword| {
            store.add(
                keyword,
                "Site selection providing this point",
                defaults::node(&[NodeType::Select], "site"),
            )
        })
}

pub(super) fn distance_keywords() -> KeywordStore {
    site_keywords(2)
}

pub(super) fn angle_keywords() -> KeywordStore {
    site_keywords(3)
}

/// Current sites of the first `count` site keywords, or `None` while any is unset.
fn sites(procedure: &Procedure, id: NodeId, count: usize) -> Result<Option<Vec<Site>>, NodeError> {
    let view = NodeView::new(procedure, id)?;
    let mut sites = Vec::with_capacity(count);
    for &keyword in &SITE_KEYWORDS[..count] {
        let select = view.required_reference(keyword)?;
        match current_site(procedure, select) {
            Some(site) => sites.push(site),
            None => return Ok(None),
        }
    }
    Ok(Some(sites))
}

fn publish(procedure: &mut Procedure, id: NodeId, value: Option<f64>) -> Result<(), NodeError> {
    if let Some(v) = value {
        procedure
            .try_node_mut(id)?
            .set_parameter("value", ExpressionValue::Double(v));
    }
    set_state(procedure, id, NodeState::Calculated(value))
}

/// Minimum-image separation of sites I and J.
pub(super) fn execute_distance(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let value = sites(procedure, id, 2)?.map(|s| {
        let configuration = ctx.configuration.borrow();
        configuration
            .simbox()
            .minimum_distance(&s[0].origin, &s[1].origin)
    });
    publish(procedure, id, value)
}

/// Angle I-J-K at site J, in degrees.
pub(super) fn execute_angle(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let value = sites(procedure, id, 3)?.map(|s| {
        let configuration = ctx.configuration.borrow();
        let simbox = configuration.simbox();
        let ji = simbox.minimum_vector(&s[1].origin, &s[0].origin);
        let jk = simbox.minimum_vector(&s[1].origin, &s[2].origin);
        ji.angle(&jk).to_degrees()
    });
    publish(procedure, id, value)
}

/// The value last calculated by a Calculate-family node.
pub(super) fn calculated_value(procedure: &Procedure, id: NodeId) -> Option<f64> {
    match procedure.node(id)?.state() {
        NodeState::Calculated(value) => *value,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::core::expression::ExpressionValue;
    use crate::core::models::configuration::Molecule;
    use crate::core::models::simbox::SimBox;
    use crate::core::models::species::test_species::argon;
    use crate::engine::node::{NodeType, NodeUsage};
    use nalgebra::Point3;

    fn argon_at(h: &Harness, points: &[[f64; 3]]) {
        let mut cfg = h.configuration.borrow_mut();
        cfg.set_simbox(SimBox::cubic(10.0));
        let a = argon();
        for p in points {
            cfg.add_molecule(Molecule::from_species(&a, vec![Point3::new(p[0], p[1], p[2])]));
        }
    }

    #[test]
    fn distance_uses_minimum_image_and_is_exposed_as_parameter() {
        let mut h = Harness::new(NodeUsage::Analysis);
        argon_at(&h, &[[1.0, 5.0, 5.0], [9.5, 5.0, 5.0]]);
        let a = h.add(NodeType::Select, Some("A"), &[("Site", &["Argon", "Ar"])]);
        let b = h.add_in(
            a,
            NodeType::Select,
            Some("B"),
            &[("Site", &["Argon", "Ar"]), ("ExcludeSameMolecule", &["A"])],
        );
        let rab = h.add_in(b, NodeType::CalculateDistance, Some("rAB"), &[("I", &["A"]), ("J", &["B"])]);
        let after = h.add_in(b, NodeType::Parameters, None, &[("Parameter", &["d", "rAB.value"])]);

        h.run().unwrap();
        assert_eq!(h.parameter(rab, "value"), ExpressionValue::Double(1.5));
        assert_eq!(h.parameter(after, "d"), ExpressionValue::Double(1.5));
    }

    #[test]
    fn angle_is_measured_at_the_middle_site() {
        let mut h = Harness::new(NodeUsage::Analysis);
        argon_at(&h, &[[6.0, 5.0, 5.0], [5.0, 5.0, 5.0], [5.0, 6.0, 5.0]]);
        let a = h.add(NodeType::Select, Some("A"), &[("Site", &["Argon", "Ar"])]);
        let b = h.add_in(
            a,
            NodeType::Select,
            Some("B"),
            &[("Site", &["Argon", "Ar"]), ("ExcludeSameSite", &["A"])],
        );
        let c = h.add_in(
            b,
            NodeType::Select,
            Some("C"),
            &[("Site", &["Argon", "Ar"]), ("ExcludeSameSite", &["A", "B"])],
        );
        let angle = h.add_in(
            c,
            NodeType::CalculateAngle,
            Some("Theta"),
            &[("I", &["A"]), ("J", &["B"]), ("K", &["C"])],
        );

        h.run().unwrap();
        // Last triple visited: A on the third argon, B on the second, C on the first.
        let ExpressionValue::Double(theta) = h.parameter(angle, "value") else {
            panic!("angle should be a double");
        };
        assert!((theta - 90.0).abs() < 1e-9);
        assert_eq!(h.procedure.node(angle).unwrap().stats().executions, 6);
    }

    #[test]
    fn unset_site_leaves_no_value() {
        let mut h = Harness::new(NodeUsage::Analysis);
        h.add(NodeType::Select, Some("A"), &[("Site", &["Argon", "Ar"])]);
        h.add(NodeType::Select, Some("B"), &[("Site", &["Argon", "Ar"])]);
        let calc = h.add(NodeType::CalculateDistance, Some("r"), &[("I", &["A"]), ("J", &["B"])]);
        h.run().unwrap();
        assert_eq!(super::calculated_value(&h.procedure, calc), None);
    }
}
