mod common;
mod props_tests;
mod variant_tests;
