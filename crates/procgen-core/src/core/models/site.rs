use super::configuration::Configuration;
use super::elements::same_element;
use super::ids::MoleculeId;
use super::species::{Species, geometric_centre};
use nalgebra::Point3;

/// A point of interest on a specific molecule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Site {
    pub molecule: MoleculeId,
    pub origin: Point3<f64>,
}

/// Instances of the named species site across the configuration, in molecule order.
///
/// Returns `None` if the species has no such site.
pub fn species_sites(
    configuration: &Configuration,
    species: &Species,
    site_name: &str,
) -> Option<Vec<Site>> {
    let site = species.site(site_name)?;
    let sites = configuration
        .molecules_iter()
        .filter(|(_, m)| m.species.eq_ignore_ascii_case(&species.name))
        .filter_map(|(id, m)| {
            let points: Option<Vec<Point3<f64>>> =
                site.atoms.iter().map(|&i| m.positions.get(i).copied()).collect();
            points.map(|p| Site {
                molecule: id,
                origin: geometric_centre(&p),
            })
        })
        .collect();
    Some(sites)
}

/// One site per atom whose element is in `elements`.
pub fn element_sites(configuration: &Configuration, elements: &[String]) -> Vec<Site> {
    configuration
        .molecules_iter()
        .flat_map(move |(id, m)| {
            m.elements
                .iter()
                .zip(&m.positions)
                .filter(move |(el, _)| elements.iter().any(|e| same_element(e, el)))
                .map(move |(_, p)| Site {
                    molecule: id,
                    origin: *p,
                })
        })
        .collect()
}
