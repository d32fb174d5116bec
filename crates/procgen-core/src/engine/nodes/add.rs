use super::{NodeView, region_of, set_count, set_state};
use crate::core::models::configuration::Molecule;
use crate::core::models::region::Region;
use crate::core::models::simbox::SimBox;
use crate::core::models::species::Species;
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::ids::NodeId;
use crate::engine::keywords::{KeywordStore, KeywordValue, defaults};
use crate::engine::node::{NodeState, NodeType, REGION_NODES};
use crate::engine::node_value::NodeValue;
use crate::engine::procedure::Procedure;
use nalgebra::{Point3, Quaternion, UnitQuaternion, Vector3};
use rand::Rng;
use std::f64::consts::TAU;
use tracing::debug;

const BOX_ACTIONS: &[&str] = &["None", "AddVolume", "ScaleVolume"];
const POSITIONING: &[&str] = &["Central", "Current", "Random", "Region"];
const DENSITY_UNITS: &[&str] = &["atoms/A3", "g/cm3"];

/// Avogadro's number scaled so that g/mol over g/cm3 gives cubic angstroms.
const AVOGADRO_PER_A3: f64 = 0.602_214_085_7;

fn with_insertion(store: KeywordStore) -> KeywordStore {
    store
        .add("Population", "Number of molecules (or pairs) to add", defaults::integer(1))
        .add(
            "Density",
            "Density at which to add the molecules, with units",
            KeywordValue::ValueOption {
                value: NodeValue::Double(0.1),
                options: DENSITY_UNITS,
                index: 0,
            },
        )
        .add(
            "BoxAction",
            "How to modify the box to accommodate the new molecules",
            defaults::option(BOX_ACTIONS, "AddVolume"),
        )
        .add("ScaleA", "Whether the A axis may be scaled", KeywordValue::Bool(true))
        .add("ScaleB", "Whether the B axis may be scaled", KeywordValue::Bool(true))
        .add("ScaleC", "Whether the C axis may be scaled", KeywordValue::Bool(true))
        .add("Rotate", "Whether to randomly rotate each new molecule", KeywordValue::Bool(true))
        .add(
            "Positioning",
            "How new molecules are positioned",
            defaults::option(POSITIONING, "Random"),
        )
        .add(
            "Region",
            "Region into which molecules are placed when positioning by region",
            defaults::node(REGION_NODES, "region"),
        )
}

pub(super) fn add_keywords() -> KeywordStore {
    with_insertion(KeywordStore::new().add(
        "Species",
        "Species to add",
        KeywordValue::Species(None),
    ))
    .add(
        "CoordinateSets",
        "Coordinate sets to draw molecule geometries from",
        defaults::node(&[NodeType::CoordinateSets], "coordinate sets"),
    )
}

pub(super) fn add_pair_keywords() -> KeywordStore {
    with_insertion(
        KeywordStore::new()
            .add("SpeciesA", "First species of the pair", KeywordValue::Species(None))
            .add("SpeciesB", "Second species of the pair", KeywordValue::Species(None)),
    )
}

pub(super) fn coordinate_sets_keywords() -> KeywordStore {
    KeywordStore::new()
        .add("Species", "Species to generate coordinates for", KeywordValue::Species(None))
        .add("NSets", "Number of coordinate sets to generate", defaults::integer(1))
        .add("Rotate", "Whether to randomly rotate each set", KeywordValue::Bool(true))
}

/// A uniformly distributed random rotation (Shoemake's method).
fn random_rotation<R: Rng + ?Sized>(rng: &mut R) -> UnitQuaternion<f64> {
    let (u1, u2, u3): (f64, f64, f64) = (rng.r#gen(), rng.r#gen(), rng.r#gen());
    let (a, b) = ((1.0 - u1).sqrt(), u1.sqrt());
    UnitQuaternion::from_quaternion(Quaternion::new(
        a * (TAU * u2).sin(),
        a * (TAU * u2).cos(),
        b * (TAU * u3).sin(),
        b * (TAU * u3).cos(),
    ))
}

fn population(view: &NodeView) -> Result<usize, NodeError> {
    let population = view.integer("Population")?;
    usize::try_from(population).map_err(|_| {
        view.keyword_error(
            "Population",
            format!("population must not be negative, got {}", population),
        )
    })
}

/// Per-axis factors that take the box from `current` to `required` volume,
/// spread evenly over the scalable axes.
fn scale_factors(current: f64, required: f64, axes: [bool; 3]) -> Option<Vector3<f64>> {
    let n_scalable = axes.iter().filter(|a| **a).count();
    if n_scalable == 0 || current <= 0.0 {
        return None;
    }
    let factor = (required / current).powf(1.0 / n_scalable as f64);
    let along = |i: usize| if axes[i] { factor } else { 1.0 };
    Some(Vector3::new(along(0), along(1), along(2)))
}

/// Resizes the box for `n_atoms` new atoms of total mass `mass` according to `BoxAction`.
fn resize_box(view: &NodeView, ctx: ProcedureContext, n_atoms: usize, mass: f64) -> Result<(), NodeError> {
    let action = view.option("BoxAction")?;
    if action == "None" {
        return Ok(());
    }
    let (density, units) = view.value_option("Density")?;
    if density <= 0.0 {
        return Err(view.keyword_error("Density", format!("density must be positive, got {}", density)));
    }
    let by_mass = units == "g/cm3";
    let volume_for = |atoms: f64, grams: f64| {
        if by_mass {
            grams / (AVOGADRO_PER_A3 * density)
        } else {
            atoms / density
        }
    };

    let mut configuration = ctx.configuration.borrow_mut();
    let mut required = volume_for(n_atoms as f64, mass);
    if configuration.n_atoms() > 0 {
        required += match action {
            "ScaleVolume" => volume_for(configuration.n_atoms() as f64, configuration.total_mass()),
            _ => configuration.simbox().volume(),
        };
    }

    let axes = [view.flag("ScaleA"), view.flag("ScaleB"), view.flag("ScaleC")];
    let factors = scale_factors(configuration.simbox().volume(), required, axes)
        .ok_or_else(|| view.keyword_error("BoxAction", "no box axis may be scaled"))?;
    configuration.scale_box(factors);
    debug!(
        volume = configuration.simbox().volume(),
        factors = ?(factors.x, factors.y, factors.z),
        "Box resized for new molecules"
    );
    Ok(())
}

enum Positioning {
    Central,
    Current,
    Random,
    Region(Region),
}

impl Positioning {
    fn read(view: &NodeView, procedure: &Procedure) -> Result<Self, NodeError> {
        Ok(match view.option("Positioning")? {
            "Central" => Positioning::Central,
            "Current" => Positioning::Current,
            "Region" => {
                let node = view.required_reference("Region")?;
                let region = region_of(procedure, node)
                    .ok_or_else(|| view.keyword_error("Region", "referenced region has not been generated"))?;
                if region.is_empty() {
                    return Err(view.keyword_error("Region", "region contains no free space"));
                }
                Positioning::Region(region.clone())
            }
            _ => Positioning::Random,
        })
    }

    /// Moves the group so the midpoint of its centres lands on the chosen point,
    /// then optionally spins it about that point.
    fn place<R: Rng + ?Sized>(&self, group: &mut [Molecule], simbox: &SimBox, rotate: bool, rng: &mut R) {
        let reference = Point3::from(
            group.iter().map(|m| m.centre().coords).sum::<Vector3<f64>>() / group.len().max(1) as f64,
        );
        let target = match self {
            Positioning::Central => simbox.centre(),
            Positioning::Current => reference,
            Positioning::Random => simbox.random_position(rng),
            Positioning::Region(region) => region.random_position(rng).unwrap_or(reference),
        };
        let delta = target - reference;
        let rotation = rotate.then(|| random_rotation(rng));
        for molecule in group.iter_mut() {
            molecule.translate(&delta);
            if let Some(rotation) = &rotation {
                molecule.rotate_about(&target, rotation);
            }
        }
    }
}

fn coordinate_sets(procedure: &Procedure, id: NodeId) -> &[Vec<Point3<f64>>] {
    match procedure.node(id).map(|n| n.state()) {
        Some(NodeState::CoordinateSets(sets)) => sets,
        _ => &[],
    }
}

pub(super) fn execute_add(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let view = NodeView::new(procedure, id)?;
    let species = view.species("Species", ctx.engine.core())?;
    let population = population(&view)?;
    let sets: &[Vec<Point3<f64>>] = match view.reference("CoordinateSets")? {
        Some(node) => coordinate_sets(procedure, node),
        None => &[],
    };
    if let Some(bad) = sets.iter().find(|s| s.len() != species.n_atoms()) {
        return Err(view.keyword_error(
            "CoordinateSets",
            format!(
                "coordinate set has {} atoms but species '{}' has {}",
                bad.len(),
                species.name,
                species.n_atoms()
            ),
        ));
    }

    resize_box(&view, ctx, population * species.n_atoms(), population as f64 * species.mass())?;
    let positioning = Positioning::read(&view, procedure)?;
    let rotate = view.flag("Rotate");
    debug!(species = %species.name, population, "Adding molecules");

    let mut configuration = ctx.configuration.borrow_mut();
    let simbox = configuration.simbox().clone();
    ctx.engine.with_rng(|rng| {
        for n in 0..population {
            let positions = match sets.get(n % sets.len().max(1)) {
                Some(set) => set.clone(),
                None => species.positions(),
            };
            let mut group = [Molecule::from_species(species, positions)];
            positioning.place(&mut group, &simbox, rotate, rng);
            let [molecule] = group;
            configuration.add_molecule(molecule);
        }
    });
    Ok(())
}

/// Adds molecules of two species as rigid pairs sharing one placement.
pub(super) fn execute_add_pair(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let view = NodeView::new(procedure, id)?;
    let core = ctx.engine.core();
    let species_a: &Species = view.species("SpeciesA", core)?;
    let species_b: &Species = view.species("SpeciesB", core)?;
    let population = population(&view)?;

    resize_box(
        &view,
        ctx,
        population * (species_a.n_atoms() + species_b.n_atoms()),
        population as f64 * (species_a.mass() + species_b.mass()),
    )?;
    let positioning = Positioning::read(&view, procedure)?;
    let rotate = view.flag("Rotate");
    debug!(a = %species_a.name, b = %species_b.name, population, "Adding molecule pairs");

    let mut configuration = ctx.configuration.borrow_mut();
    let simbox = configuration.simbox().clone();
    ctx.engine.with_rng(|rng| {
        for _ in 0..population {
            let mut pair = [
                Molecule::from_species(species_a, species_a.positions()),
                Molecule::from_species(species_b, species_b.positions()),
            ];
            positioning.place(&mut pair, &simbox, rotate, rng);
            for molecule in pair {
                configuration.add_molecule(molecule);
            }
        }
    });
    Ok(())
}

/// Generates centred, optionally rotated, geometries of a species.
pub(super) fn execute_coordinate_sets(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let sets = {
        let view = NodeView::new(procedure, id)?;
        let species = view.species("Species", ctx.engine.core())?;
        let n_sets = view.integer("NSets")?;
        if n_sets < 1 {
            return Err(view.keyword_error("NSets", format!("at least one set is required, got {}", n_sets)));
        }
        let rotate = view.flag("Rotate");
        let centred = species.centred_positions();
        ctx.engine.with_rng(|rng| {
            (0..n_sets)
                .map(|_| {
                    if !rotate {
                        return centred.clone();
                    }
                    let rotation = random_rotation(rng);
                    centred.iter().map(|p| rotation * p).collect()
                })
                .collect::<Vec<Vec<Point3<f64>>>>()
        })
    };
    set_count(procedure, id, "nSets", sets.len())?;
    set_state(procedure, id, NodeState::CoordinateSets(sets))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::core::expression::ExpressionValue;
    use crate::core::models::species::test_species::water;
    use crate::engine::node::NodeUsage;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn random_rotations_preserve_lengths() {
        let mut rng = StdRng::seed_from_u64(3);
        let v = Vector3::new(1.0, 2.0, -0.5);
        for _ in 0..20 {
            let r = random_rotation(&mut rng) * v;
            assert!((r.norm() - v.norm()).abs() < 1e-10);
        }
    }

    #[test]
    fn add_volume_sizes_empty_box_from_atomic_density() {
        let mut h = Harness::new(NodeUsage::Generation);
        h.add(
            NodeType::Add,
            None,
            &[
                ("Species", &["Argon"]),
                ("Population", &["100"]),
                ("Density", &["0.01", "atoms/A3"]),
            ],
        );
        h.run().unwrap();
        let cfg = h.configuration.borrow();
        assert_eq!(cfg.n_molecules(), 100);
        assert!((cfg.simbox().volume() - 10000.0).abs() < 1e-6);
        let lengths = cfg.simbox().lengths();
        for (_, m) in cfg.molecules_iter() {
            let c = m.centre();
            assert!((0..3).all(|i| c[i] >= 0.0 && c[i] <= lengths[i]));
        }
    }

    #[test]
    fn chemical_density_and_fixed_axes_are_honoured() {
        let mut h = Harness::new(NodeUsage::Generation);
        h.add(
            NodeType::Add,
            None,
            &[
                ("Species", &["Water"]),
                ("Population", &["10"]),
                ("Density", &["1.0", "g/cm3"]),
                ("ScaleC", &["false"]),
            ],
        );
        h.run().unwrap();
        let expected = 10.0 * water().mass() / AVOGADRO_PER_A3;
        let cfg = h.configuration.borrow();
        assert!((cfg.simbox().volume() - expected).abs() < 1e-6);
        assert_eq!(cfg.simbox().lengths().z, 1.0);
    }

    #[test]
    fn region_positioning_requires_free_space() {
        let mut h = Harness::new(NodeUsage::Generation);
        h.configuration.borrow_mut().set_simbox(SimBox::cubic(5.0));
        h.add(
            NodeType::CustomRegion,
            Some("Nowhere"),
            &[("Expression", &["x"]), ("Minimum", &["100"]), ("Maximum", &["200"])],
        );
        h.add(
            NodeType::Add,
            None,
            &[
                ("Species", &["Argon"]),
                ("BoxAction", &["None"]),
                ("Positioning", &["Region"]),
                ("Region", &["Nowhere"]),
            ],
        );
        let err = h.run().unwrap_err();
        assert_eq!(err.keyword, Some("Region"));
        assert_eq!(h.configuration.borrow().n_molecules(), 0);
    }

    #[test]
    fn coordinate_sets_are_cycled_in_order() {
        let mut h = Harness::new(NodeUsage::Generation);
        let sets = h.add(
            NodeType::CoordinateSets,
            Some("Sets"),
            &[("Species", &["Water"]), ("NSets", &["3"])],
        );
        h.add(
            NodeType::Add,
            None,
            &[
                ("Species", &["Water"]),
                ("Population", &["4"]),
                ("BoxAction", &["None"]),
                ("Positioning", &["Current"]),
                ("Rotate", &["false"]),
                ("CoordinateSets", &["Sets"]),
            ],
        );
        h.run().unwrap();
        assert_eq!(h.parameter(sets, "nSets"), ExpressionValue::Integer(3));
        let cfg = h.configuration.borrow();
        let molecules: Vec<_> = cfg.molecules_iter().map(|(_, m)| m.positions.clone()).collect();
        assert_eq!(molecules[0], molecules[3]);
        assert_ne!(molecules[0], molecules[1]);
    }

    #[test]
    fn pairs_share_a_central_placement() {
        let mut h = Harness::new(NodeUsage::Generation);
        h.configuration.borrow_mut().set_simbox(SimBox::cubic(10.0));
        h.add(
            NodeType::AddPair,
            None,
            &[
                ("SpeciesA", &["Water"]),
                ("SpeciesB", &["Argon"]),
                ("BoxAction", &["None"]),
                ("Positioning", &["Central"]),
            ],
        );
        h.run().unwrap();
        let cfg = h.configuration.borrow();
        let centres: Vec<_> = cfg.molecules_iter().map(|(_, m)| m.centre()).collect();
        assert_eq!(centres.len(), 2);
        let midpoint = Point3::from((centres[0].coords + centres[1].coords) * 0.5);
        assert!((midpoint - Point3::new(5.0, 5.0, 5.0)).norm() < 1e-9);
    }
}
