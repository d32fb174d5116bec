use super::{NodeView, current_site, set_count};
use crate::core::io::traits::CoordinateFile;
use crate::core::io::xyz::XyzFile;
use crate::core::models::configuration::Molecule;
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::ids::NodeId;
use crate::engine::keywords::{KeywordStore, KeywordValue, defaults};
use crate::engine::node::{NodeType, PICK_NODES};
use crate::engine::procedure::Procedure;
use nalgebra::{UnitQuaternion, Vector3};
use tracing::{debug, info};

const AXES: &[&str] = &["X", "Y", "Z"];

fn with_targets(store: KeywordStore, what: &'static str) -> KeywordStore {
    store
        .add("Species", what, KeywordValue::SpeciesVector(Vec::new()))
        .add(
            "Selection",
            "Picked molecules to act on",
            defaults::node(PICK_NODES, "selection"),
        )
}

pub(super) fn remove_keywords() -> KeywordStore {
    with_targets(KeywordStore::new(), "Species whose molecules are removed")
}

pub(super) fn transmute_keywords() -> KeywordStore {
    with_targets(KeywordStore::new(), "Species whose molecules are transmuted").add(
        "Target",
        "Species the molecules are turned into",
        KeywordValue::Species(None),
    )
}

pub(super) fn rotate_fragment_keywords() -> KeywordStore {
    KeywordStore::new()
        .add(
            "Site",
            "Site whose molecule is rotated about the site origin",
            defaults::node(&[NodeType::Select], "site"),
        )
        .add("Rotation", "Rotation angle in degrees", defaults::double(90.0))
        .add("Axis", "Cartesian axis to rotate about", defaults::option(AXES, "Z"))
}

pub(super) fn copy_keywords() -> KeywordStore {
    KeywordStore::new()
        .add("Source", "Configuration to copy", KeywordValue::Configuration(None))
        .add(
            "Exclude",
            "Species not to copy from the source",
            KeywordValue::SpeciesVector(Vec::new()),
        )
        .add(
            "CopyGlobalPotentials",
            "Whether to take the source's external potentials",
            KeywordValue::Bool(true),
        )
}

pub(super) fn import_keywords() -> KeywordStore {
    KeywordStore::new().add(
        "File",
        "XYZ file providing new coordinates for every atom",
        KeywordValue::Text(None),
    )
}

pub(super) fn execute_remove(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let removed = {
        let view = NodeView::new(procedure, id)?;
        let mut configuration = ctx.configuration.borrow_mut();
        let targets = view.chosen_molecules("Species", "Selection", &configuration)?;
        targets
            .into_iter()
            .filter(|&m| configuration.remove_molecule(m).is_some())
            .count()
    };
    debug!(removed, "Removed molecules");
    set_count(procedure, id, "nRemoved", removed)
}

/// Replaces each chosen molecule with the target species, centred where the old one was.
pub(super) fn execute_transmute(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let view = NodeView::new(procedure, id)?;
    let target = view.species("Target", ctx.engine.core())?;
    let mut configuration = ctx.configuration.borrow_mut();
    let molecules = view.chosen_molecules("Species", "Selection", &configuration)?;
    for m in &molecules {
        if let Some(molecule) = configuration.molecule_mut(*m) {
            let centre = molecule.centre();
            let mut replacement = Molecule::from_species(target, target.positions());
            replacement.set_centre(&centre);
            *molecule = replacement;
        }
    }
    debug!(count = molecules.len(), target = %target.name, "Transmuted molecules");
    Ok(())
}

pub(super) fn execute_rotate_fragment(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let view = NodeView::new(procedure, id)?;
    let select = view.required_reference("Site")?;
    let site = current_site(procedure, select)
        .ok_or_else(|| view.keyword_error("Site", "referenced selection has no current site"))?;
    let angle = view.double("Rotation")?.to_radians();
    let axis = match view.option("Axis")? {
        "X" => Vector3::x_axis(),
        "Y" => Vector3::y_axis(),
        _ => Vector3::z_axis(),
    };
    let rotation = UnitQuaternion::from_axis_angle(&axis, angle);

    let mut configuration = ctx.configuration.borrow_mut();
    let molecule = configuration
        .molecule_mut(site.molecule)
        .ok_or_else(|| view.keyword_error("Site", "molecule of the current site no longer exists"))?;
    molecule.rotate_about(&site.origin, &rotation);
    Ok(())
}

/// Replaces the target's contents with a registered configuration, keeping the target's name.
pub(super) fn execute_copy(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let view = NodeView::new(procedure, id)?;
    let source_name = view
        .node()
        .keywords
        .get_configuration("Source")
        .ok_or_else(|| view.node().keyword_missing("Source"))?;
    let source = ctx
        .engine
        .core()
        .configuration(source_name)
        .ok_or_else(|| view.keyword_error("Source", format!("configuration '{}' is not defined", source_name)))?;
    let exclude = view.species_names("Exclude");

    let mut configuration = ctx.configuration.borrow_mut();
    let name = configuration.name().to_string();
    let potentials = configuration.potentials().to_vec();

    let mut copy = source.clone();
    let excluded: Vec<_> = copy
        .molecules_iter()
        .filter(|(_, m)| exclude.iter().any(|s| s.eq_ignore_ascii_case(&m.species)))
        .map(|(id, _)| id)
        .collect();
    for m in excluded {
        copy.remove_molecule(m);
    }
    copy.set_name(&name);
    if !view.flag("CopyGlobalPotentials") {
        copy.clear_potentials();
        for potential in potentials {
            copy.add_potential(potential);
        }
    }
    info!(source = %source.name(), molecules = copy.n_molecules(), "Copied configuration");
    *configuration = copy;
    Ok(())
}

/// Overwrites every atom position, in molecule order, from an XYZ file.
pub(super) fn execute_import(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let view = NodeView::new(procedure, id)?;
    let path = view
        .text("File")
        .ok_or_else(|| view.node().keyword_missing("File"))?;
    let frame = XyzFile::read_from_path(path)
        .map_err(|e| view.keyword_error("File", format!("failed to read '{}': {}", path, e)))?;

    let mut configuration = ctx.configuration.borrow_mut();
    if frame.n_atoms() != configuration.n_atoms() {
        return Err(view.keyword_error(
            "File",
            format!(
                "file has {} atoms but the configuration has {}",
                frame.n_atoms(),
                configuration.n_atoms()
            ),
        ));
    }
    let ids = configuration.molecule_ids().to_vec();
    let mut positions = frame.positions.into_iter();
    for m in ids {
        if let Some(molecule) = configuration.molecule_mut(m) {
            for (p, new) in molecule.positions.iter_mut().zip(positions.by_ref()) {
                *p = new;
            }
        }
    }
    debug!(path, "Imported coordinates");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::core::expression::ExpressionValue;
    use crate::core::models::configuration::{Configuration, Molecule};
    use crate::core::models::simbox::SimBox;
    use crate::core::models::species::test_species::{argon, water};
    use crate::engine::context::{Engine, ProcedureContext};
    use crate::engine::node::{NodeType, NodeUsage};
    use crate::engine::pool::ProcessPool;
    use crate::engine::procedure::Procedure;
    use crate::engine::progress::ProgressReporter;
    use nalgebra::Point3;
    use std::cell::RefCell;
    use std::io::Write;

    fn populate(h: &Harness) {
        let mut cfg = h.configuration.borrow_mut();
        cfg.set_simbox(SimBox::cubic(20.0));
        let (w, a) = (water(), argon());
        for x in [2.0, 6.0] {
            let mut m = Molecule::from_species(&w, w.positions());
            m.set_centre(&Point3::new(x, 2.0, 2.0));
            cfg.add_molecule(m);
        }
        cfg.add_molecule(Molecule::from_species(&a, vec![Point3::new(10.0, 2.0, 2.0)]));
    }

    #[test]
    fn remove_counts_species_and_selection_once() {
        let mut h = Harness::new(NodeUsage::Generation);
        populate(&h);
        h.add(NodeType::Pick, Some("Waters"), &[("Species", &["Water"])]);
        let remove = h.add(
            NodeType::Remove,
            None,
            &[("Species", &["Water"]), ("Selection", &["Waters"])],
        );
        h.run().unwrap();
        assert_eq!(h.parameter(remove, "nRemoved"), ExpressionValue::Integer(2));
        assert_eq!(h.configuration.borrow().n_molecules(), 1);
    }

    #[test]
    fn remove_without_targets_fails() {
        let mut h = Harness::new(NodeUsage::Generation);
        h.add(NodeType::Remove, None, &[]);
        assert_eq!(h.run().unwrap_err().keyword, Some("Species"));
    }

    #[test]
    fn transmute_keeps_molecule_centres() {
        let mut h = Harness::new(NodeUsage::Generation);
        populate(&h);
        h.add(
            NodeType::Transmute,
            None,
            &[("Species", &["Water"]), ("Target", &["Argon"])],
        );
        h.run().unwrap();
        let cfg = h.configuration.borrow();
        assert_eq!(cfg.molecules_of_species("Argon").len(), 3);
        assert_eq!(cfg.n_atoms(), 3);
        let first = cfg.molecules_iter().next().unwrap().1;
        assert!((first.centre() - Point3::new(2.0, 2.0, 2.0)).norm() < 1e-9);
    }

    #[test]
    fn rotate_fragment_turns_molecule_about_site() {
        let mut h = Harness::new(NodeUsage::Generation);
        populate(&h);
        let select = h.add(NodeType::Select, Some("O"), &[("Site", &["Water", "O"])]);
        h.add_in(
            select,
            NodeType::RotateFragment,
            None,
            &[("Site", &["O"]), ("Rotation", &["180"]), ("Axis", &["Z"])],
        );
        let before: Vec<_> = h
            .configuration
            .borrow()
            .molecules_iter()
            .map(|(_, m)| m.positions.clone())
            .collect();
        h.run().unwrap();
        let cfg = h.configuration.borrow();
        for ((_, m), old) in cfg.molecules_iter().zip(&before).take(2) {
            assert!((m.positions[0] - old[0]).norm() < 1e-9);
            let expected = old[0] - (old[1] - old[0]);
            assert!((m.positions[1] - expected).norm() < 1e-9);
        }
    }

    #[test]
    fn copy_replaces_contents_minus_excluded_species() {
        let mut source = Configuration::new("Bulk");
        source.set_simbox(SimBox::cubic(30.0));
        let (w, a) = (water(), argon());
        source.add_molecule(Molecule::from_species(&w, w.positions()));
        source.add_molecule(Molecule::from_species(&a, a.positions()));

        let mut core = core();
        core.add_configuration(source).unwrap();
        let mut procedure = Procedure::new(NodeUsage::Generation);
        let root = procedure.root();
        let copy = procedure.append_node(root, NodeType::Copy, None).unwrap();
        procedure.set_keyword(copy, "Source", &args(&["Bulk"]), &core).unwrap();
        procedure.set_keyword(copy, "Exclude", &args(&["Argon"]), &core).unwrap();

        let target = RefCell::new(Configuration::new("Target"));
        let engine = Engine::new(core, Some(1));
        let pool = ProcessPool::serial();
        let reporter = ProgressReporter::new();
        procedure
            .run(ProcedureContext::new(&target, &pool, &engine, &reporter))
            .unwrap();

        let cfg = target.borrow();
        assert_eq!(cfg.name(), "Target");
        assert_eq!(cfg.n_molecules(), 1);
        assert_eq!(cfg.simbox().lengths().x, 30.0);
    }

    #[test]
    fn import_requires_matching_atom_count() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "2\nshort\nO 0 0 0\nH 1 0 0").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let mut h = Harness::new(NodeUsage::Generation);
        populate(&h);
        h.add(NodeType::ImportCoordinates, None, &[("File", &[path.as_str()])]);
        let err = h.run().unwrap_err();
        assert_eq!(err.keyword, Some("File"));
        assert!(err.reason.contains("file has 2 atoms"));
    }

    #[test]
    fn import_overwrites_positions_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1\nargon\nAr 4.5 5.5 6.5").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let mut h = Harness::new(NodeUsage::Generation);
        h.configuration
            .borrow_mut()
            .add_molecule(Molecule::from_species(&argon(), vec![Point3::origin()]));
        h.add(NodeType::ImportCoordinates, None, &[("File", &[path.as_str()])]);
        h.run().unwrap();
        let cfg = h.configuration.borrow();
        assert_eq!(cfg.atom_positions(), vec![Point3::new(4.5, 5.5, 6.5)]);
    }
}
