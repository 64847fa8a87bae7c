pub(crate) mod fixtures;
mod test_energy_model;
