use tempo_core::timestep::FloatValue;

/// Mass of carbon in one ppm of atmospheric CO2
/// unit: GtC / ppm
pub const GTC_PER_PPM: FloatValue = 2.13;
