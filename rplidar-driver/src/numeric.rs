pub(crate) fn to_u16(high: u8, low: u8) -> u16 {
    ((high as u16) << 8) + (low as u16)
}

pub(crate) fn to_string(data: &[u8]) -> String {
    data.iter()
        .map(|e| format!("{:02X}", e))
        .collect::<Vec<_>>()
        .join(" ")
}
