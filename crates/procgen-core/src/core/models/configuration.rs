use super::elements::atomic_mass;
use super::ids::MoleculeId;
use super::potentials::ExternalPotential;
use super::simbox::SimBox;
use super::species::{Species, geometric_centre};
use nalgebra::{Point3, UnitQuaternion, Vector3};
use slotmap::SlotMap;

/// One instance of a species placed in a configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    pub species: String,
    pub elements: Vec<String>,
    pub positions: Vec<Point3<f64>>,
}

impl Molecule {
    pub fn from_species(species: &Species, positions: Vec<Point3<f64>>) -> Self {
        Self {
            species: species.name.clone(),
            elements: species.atoms.iter().map(|a| a.element.clone()).collect(),
            positions,
        }
    }

    pub fn n_atoms(&self) -> usize {
        self.positions.len()
    }

    pub fn centre(&self) -> Point3<f64> {
        geometric_centre(&self.positions)
    }

    pub fn translate(&mut self, delta: &Vector3<f64>) {
        for p in &mut self.positions {
            *p += *delta;
        }
    }

    pub fn set_centre(&mut self, centre: &Point3<f64>) {
        let delta = centre - self.centre();
        self.translate(&delta);
    }

    /// Rotates every atom about `origin`.
    pub fn rotate_about(&mut self, origin: &Point3<f64>, rotation: &UnitQuaternion<f64>) {
        for p in &mut self.positions {
            *p = origin + rotation * (*p - origin);
        }
    }
}

/// The target of a procedure: a periodic box of molecules plus the
/// properties and external potentials that nodes attach to it.
///
/// Molecules are stored in an arena and iterated in insertion order.
#[derive(Debug, Clone)]
pub struct Configuration {
    name: String,
    simbox: SimBox,
    molecules: SlotMap<MoleculeId, Molecule>,
    order: Vec<MoleculeId>,
    temperature: f64,
    size_factor: f64,
    potentials: Vec<ExternalPotential>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new("Configuration")
    }
}

impl Configuration {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            simbox: SimBox::default(),
            molecules: SlotMap::with_key(),
            order: Vec::new(),
            temperature: 300.0,
            size_factor: 1.0,
            potentials: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn simbox(&self) -> &SimBox {
        &self.simbox
    }

    pub fn set_simbox(&mut self, simbox: SimBox) {
        self.simbox = simbox;
    }

    /// Scales the box and moves every molecule so that its centre keeps the same
    /// fractional coordinates. Molecule geometries themselves are not distorted.
    pub fn scale_box(&mut self, factors: Vector3<f64>) {
        for molecule in self.molecules.values_mut() {
            let centre = molecule.centre();
            let scaled = Point3::from(centre.coords.component_mul(&factors));
            molecule.set_centre(&scaled);
        }
        self.simbox.scale(factors);
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature;
    }

    pub fn size_factor(&self) -> f64 {
        self.size_factor
    }

    pub fn set_size_factor(&mut self, size_factor: f64) {
        self.size_factor = size_factor;
    }

    pub fn potentials(&self) -> &[ExternalPotential] {
        &self.potentials
    }

    pub fn add_potential(&mut self, potential: ExternalPotential) {
        self.potentials.push(potential);
    }

    pub fn clear_potentials(&mut self) {
        self.potentials.clear();
    }

    pub fn add_molecule(&mut self, molecule: Molecule) -> MoleculeId {
        let id = self.molecules.insert(molecule);
        self.order.push(id);
        id
    }

    pub fn remove_molecule(&mut self, id: MoleculeId) -> Option<Molecule> {
        let molecule = self.molecules.remove(id)?;
        self.order.retain(|&m| m != id);
        Some(molecule)
    }

    pub fn molecule(&self, id: MoleculeId) -> Option<&Molecule> {
        self.molecules.get(id)
    }

    pub fn molecule_mut(&mut self, id: MoleculeId) -> Option<&mut Molecule> {
        self.molecules.get_mut(id)
    }

    /// Iterates molecules in insertion order.
    pub fn molecules_iter(&self) -> impl Iterator<Item = (MoleculeId, &Molecule)> {
        self.order
            .iter()
            .filter_map(move |&id| self.molecules.get(id).map(|m| (id, m)))
    }

    pub fn molecule_ids(&self) -> &[MoleculeId] {
        &self.order
    }

    pub fn molecules_of_species(&self, species: &str) -> Vec<MoleculeId> {
        self.molecules_iter()
            .filter(|(_, m)| m.species.eq_ignore_ascii_case(species))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn n_molecules(&self) -> usize {
        self.order.len()
    }

    pub fn n_atoms(&self) -> usize {
        self.molecules.values().map(Molecule::n_atoms).sum()
    }

    /// Atoms per cubic angstrom.
    pub fn atomic_density(&self) -> f64 {
        let volume = self.simbox.volume();
        if volume > 0.0 {
            self.n_atoms() as f64 / volume
        } else {
            0.0
        }
    }

    /// Sum of atomic masses in g/mol. Elements with unknown mass contribute nothing.
    pub fn total_mass(&self) -> f64 {
        self.molecules
            .values()
            .flat_map(|m| m.elements.iter())
            .filter_map(|e| atomic_mass(e))
            .sum()
    }

    /// All atom positions in molecule insertion order.
    pub fn atom_positions(&self) -> Vec<Point3<f64>> {
        self.molecules_iter()
            .flat_map(|(_, m)| m.positions.iter().copied())
            .collect()
    }

    /// Removes every molecule, keeping box and properties.
    pub fn clear_contents(&mut self) {
        self.molecules.clear();
        self.order.clear();
    }
}
