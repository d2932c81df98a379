//! Parse a schema content blob into descriptors.

use airport_codec::compression::decompress_envelope;
use airport_codec::WireBytes;
use airport_core::{AirportError, LocationDescriptor, Result};
use airport_registry::{decode_flight_info, SchemaContents};

/// A blob is a compressed envelope around a msgpack array of serialized
/// `FlightInfo` messages, one per remote object.
pub fn parse_schema_items(
    blob: &[u8],
    server_location: &str,
    location: &LocationDescriptor,
) -> Result<SchemaContents> {
    let payload = decompress_envelope(blob)
        .map_err(|e| AirportError::decode(location, "schema contents envelope", e))?;
    let serialized: Vec<WireBytes> = airport_codec::decode(&payload)
        .map_err(|e| AirportError::decode(location, "schema contents", e))?;
    let infos = serialized
        .iter()
        .map(|bytes| decode_flight_info(bytes, location))
        .collect::<Result<Vec<_>>>()?;
    SchemaContents::from_flight_infos(&infos, server_location)
}
