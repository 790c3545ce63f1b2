//! Photo-to-slot assignment.
//!
//! Each photo, in submission order, takes the first free slot that matches
//! one of its keywords, else the first free slot with the same orientation,
//! else the first free slot. Photos left over when slots run out are skipped.

use super::layout::{Orientation, Slot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoCandidate {
    /// File name or URL. Only the file name part is matched,
    /// case-insensitively, against slot keywords.
    pub name: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    Keyword,
    Orientation,
    FirstFree,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assignment {
    /// `(photo index, slot index, reason)`.
    pub placed: Vec<(usize, usize, MatchReason)>,
    pub skipped: Vec<usize>,
}

/// Last path segment of a URL or path, without query or fragment.
fn file_name(source: &str) -> &str {
    let path = source.split(['?', '#']).next().unwrap_or(source);
    let path = path.trim_end_matches('/');
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

pub fn assign(slots: &[Slot], photos: &[PhotoCandidate]) -> Assignment {
    let mut taken = vec![false; slots.len()];
    let mut out = Assignment::default();

    for (photo_idx, photo) in photos.iter().enumerate() {
        let name = file_name(&photo.name).to_lowercase();
        let orientation = Orientation::of(photo.width, photo.height);
        let free = |i: &usize| !taken[*i];

        let pick = (0..slots.len())
            .filter(free)
            .find(|&i| slots[i].keywords.iter().any(|k| !k.is_empty() && name.contains(&k.to_lowercase())))
            .map(|i| (i, MatchReason::Keyword))
            .or_else(|| {
                (0..slots.len())
                    .filter(free)
                    .find(|&i| slots[i].orientation == orientation)
                    .map(|i| (i, MatchReason::Orientation))
            })
            .or_else(|| (0..slots.len()).find(free).map(|i| (i, MatchReason::FirstFree)));

        match pick {
            Some((slot_idx, reason)) => {
                taken[slot_idx] = true;
                out.placed.push((photo_idx, slot_idx, reason));
            }
            None => out.skipped.push(photo_idx),
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::excel::layout::Layout;

    fn photo(name: &str, w: u32, h: u32) -> PhotoCandidate {
        PhotoCandidate { name: name.into(), width: w, height: h }
    }

    #[test]
    fn keyword_then_orientation_then_first_free() {
        let slots = Layout::default().slots;
        let photos = [
            photo("IMG_kanan_01.jpg", 400, 300),
            photo("random.jpg", 300, 400),
            photo("other.jpg", 400, 300),
        ];
        let result = assign(&slots, &photos);
        assert_eq!(result.placed[0], (0, 3, MatchReason::Keyword));
        // Portrait photo goes to the first portrait slot.
        assert_eq!(result.placed[1], (1, 4, MatchReason::Orientation));
        assert_eq!(result.placed[2], (2, 0, MatchReason::Orientation));
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn keywords_ignore_host_and_query() {
        let slots = Layout::default().slots;
        let photos = [
            photo("https://kanan-cdn.example.com/uploads/IMG_0001.jpg?tag=depan", 400, 300),
            photo("https://cdn.example.com/belakang/foto_rear.JPG#left", 400, 300),
        ];
        let result = assign(&slots, &photos);
        assert_eq!(result.placed[0], (0, 0, MatchReason::Orientation));
        assert_eq!(result.placed[1], (1, 1, MatchReason::Keyword));
        assert_eq!(file_name("C:\\foto\\kiri.png"), "kiri.png");
        assert_eq!(file_name("https://x.test/a/b/"), "b");
    }

    #[test]
    fn overflow_is_skipped() {
        let slots = Layout::default().slots;
        let photos: Vec<_> = (0..8).map(|i| photo(&format!("p{i}.png"), 10, 10)).collect();
        let result = assign(&slots, &photos);
        assert_eq!(result.placed.len(), 6);
        assert_eq!(result.skipped, vec![6, 7]);
    }

    #[test]
    fn falls_back_to_any_free_slot() {
        let slots = vec![Layout::default().slots[4].clone()];
        let result = assign(&slots, &[photo("wide.png", 800, 100)]);
        assert_eq!(result.placed, vec![(0, 0, MatchReason::FirstFree)]);
    }
}
