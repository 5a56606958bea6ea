/// Restore one output per input record
///
/// Valid slots consume parsed outputs in order; invalid slots, and valid slots left over
/// once the outputs run out, become empty strings.
pub fn reassemble(valid_mask: &[bool], parsed_outputs: Vec<String>) -> Vec<String> {
    let mut outputs = parsed_outputs.into_iter();
    valid_mask
        .iter()
        .map(|&valid| {
            if valid {
                outputs.next().unwrap_or_default()
            } else {
                String::new()
            }
        })
        .collect()
}
