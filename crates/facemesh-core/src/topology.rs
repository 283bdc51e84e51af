//! Fixed indices into the 468-point face-mesh topology.

/// Number of landmarks produced per face by the face-mesh model.
pub const MESH_POINT_COUNT: usize = 468;

pub const LEFT_MOUTH_CORNER: usize = 61;
pub const RIGHT_MOUTH_CORNER: usize = 291;
pub const UPPER_LIP_INNER: usize = 13;
pub const LOWER_LIP_INNER: usize = 14;
pub const LEFT_BROW: usize = 70;
pub const RIGHT_BROW: usize = 300;
pub const LEFT_EYE_UPPER_LID: usize = 159;

/// Silhouette loop, forehead first and clockwise around the jaw.
pub const FACE_OUTLINE: [usize; 36] = [
    10, 338, 297, 332, 284, 251, 389, 356, 454, 323, //
    361, 288, 397, 365, 379, 378, 400, 377, 152, 148, //
    176, 149, 150, 136, 172, 58, 132, 93, 234, 127, //
    162, 21, 54, 103, 67, 109,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_within_topology() {
        assert!(FACE_OUTLINE.iter().all(|&i| i < MESH_POINT_COUNT));
    }

    #[test]
    fn test_outline_has_no_repeats() {
        let mut sorted = FACE_OUTLINE.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), FACE_OUTLINE.len());
    }
}
