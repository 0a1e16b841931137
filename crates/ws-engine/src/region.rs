//! Region director: (key, velocity) to performer indices.

use ws_model::Performer;

/// Boundary table size: one entry per MIDI value plus the end marker.
const TABLE: usize = 129;

/// Key/velocity range index for one instrument.
///
/// Both axes are compressed to the distinct range boundaries, so the
/// lookup matrix is `keys × velocities` cells of performer lists rather
/// than 128 × 128.
#[derive(Clone, Debug)]
pub struct RegionDirector {
    key_table: [i16; TABLE],
    vel_table: [i16; TABLE],
    key_count: usize,
    vel_count: usize,
    matrix: Vec<Vec<usize>>,
}

impl RegionDirector {
    /// Build the index for an ordered performer list.
    pub fn new<'a, I>(performers: I) -> Self
    where
        I: IntoIterator<Item = &'a Performer> + Clone,
    {
        let mut key_table = [0i16; TABLE];
        let mut vel_table = [0i16; TABLE];

        for p in performers.clone() {
            let Some((k0, k1, v0, v1)) = bounds(p) else { continue };
            key_table[k0] = 1;
            key_table[k1 + 1] = 1;
            vel_table[v0] = 1;
            vel_table[v1 + 1] = 1;
        }
        let key_count = compress(&mut key_table);
        let vel_count = compress(&mut vel_table);

        let mut matrix = vec![Vec::new(); key_count * vel_count];
        for (ix, p) in performers.into_iter().enumerate() {
            let Some((k0, k1, v0, v1)) = bounds(p) else { continue };
            let (x0, x1) = (key_table[k0], key_table[k1]);
            let (y0, y1) = (vel_table[v0], vel_table[v1]);
            if x0 < 0 || y0 < 0 {
                continue;
            }
            for x in x0..=x1 {
                for y in y0..=y1 {
                    matrix[x as usize + y as usize * key_count].push(ix);
                }
            }
        }

        Self {
            key_table,
            vel_table,
            key_count,
            vel_count,
            matrix,
        }
    }

    /// Performer indices whose ranges cover `(key, velocity)`, in list order.
    pub fn lookup(&self, key: u8, velocity: u8) -> &[usize] {
        let (key, velocity) = (key as usize, velocity as usize);
        if key >= 128 || velocity >= 128 {
            return &[];
        }
        let x = self.key_table[key];
        let y = self.vel_table[velocity];
        if x < 0 || y < 0 {
            return &[];
        }
        self.matrix
            .get(x as usize + y as usize * self.key_count)
            .map_or(&[], |cell| cell.as_slice())
    }

    /// Compressed (key, velocity) index counts.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.key_count, self.vel_count)
    }
}

/// Clamped ranges, or `None` for a performer no MIDI key or velocity can reach.
fn bounds(p: &Performer) -> Option<(usize, usize, usize, usize)> {
    if p.key_from > p.key_to || p.vel_from > p.vel_to || p.key_from > 127 || p.vel_from > 127 {
        return None;
    }
    let r = |v: u8| (v as usize).min(127);
    Some((r(p.key_from), r(p.key_to), r(p.vel_from), r(p.vel_to)))
}

/// Turn a table of boundary marks into per-value compressed indices.
///
/// Values before the first mark and from the last mark on become -1. The
/// last mark only closes the final range, so it does not add an index.
fn compress(table: &mut [i16; TABLE]) -> usize {
    for i in (0..TABLE).rev() {
        let marked = table[i] == 1;
        table[i] = -1;
        if marked {
            break;
        }
    }
    let mut counter: i16 = -1;
    for i in 0..TABLE {
        if table[i] != 0 {
            counter += 1;
            if table[i] == -1 {
                break;
            }
        }
        table[i] = counter;
    }
    counter.max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perf(k0: u8, k1: u8, v0: u8, v1: u8) -> Performer {
        Performer::default().keys(k0, k1).velocities(v0, v1)
    }

    #[test]
    fn single_key_performer_answers_only_that_key() {
        let performers = [perf(60, 60, 0, 127)];
        let dir = RegionDirector::new(&performers);
        for vel in 0..128u8 {
            assert_eq!(dir.lookup(60, vel), &[0]);
        }
        for key in (0..128u8).filter(|&k| k != 60) {
            assert!(dir.lookup(key, 100).is_empty(), "key {key}");
        }
    }

    #[test]
    fn out_of_range_performers_are_skipped() {
        let performers = [perf(128, 200, 0, 127), perf(0, 127, 130, 140), perf(100, 200, 0, 127)];
        let dir = RegionDirector::new(&performers);
        assert_eq!(dir.lookup(127, 100), &[2]);
        assert!(dir.lookup(50, 127).is_empty());
    }

    #[test]
    fn gapless_split_covers_everything() {
        let performers = [
            perf(0, 59, 0, 63),
            perf(0, 59, 64, 127),
            perf(60, 127, 0, 127),
        ];
        let dir = RegionDirector::new(&performers);
        for key in 0..128u8 {
            for vel in 0..128u8 {
                let hits = dir.lookup(key, vel);
                assert_eq!(hits.len(), 1, "({key}, {vel})");
                assert!(performers[hits[0]].covers(key, vel));
            }
        }
    }

    #[test]
    fn overlapping_layers_keep_list_order() {
        let performers = [perf(0, 127, 0, 127), perf(40, 80, 0, 127), perf(60, 60, 100, 127)];
        let dir = RegionDirector::new(&performers);
        assert_eq!(dir.lookup(60, 110), &[0, 1, 2]);
        assert_eq!(dir.lookup(60, 99), &[0, 1]);
        assert_eq!(dir.lookup(20, 110), &[0]);
    }

    #[test]
    fn inverted_ranges_are_skipped() {
        let performers = [perf(70, 60, 0, 127), perf(10, 20, 0, 127)];
        let dir = RegionDirector::new(&performers);
        assert!(dir.lookup(65, 64).is_empty());
        assert_eq!(dir.lookup(15, 64), &[1]);
    }

    #[test]
    fn empty_list_matches_nothing() {
        let dir = RegionDirector::new(&[] as &[Performer]);
        assert_eq!(dir.dimensions(), (0, 0));
        assert!(dir.lookup(60, 64).is_empty());
    }

    #[test]
    fn out_of_range_input_matches_nothing() {
        let dir = RegionDirector::new(&[perf(0, 127, 0, 127)]);
        assert!(dir.lookup(128, 64).is_empty());
        assert!(dir.lookup(60, 200).is_empty());
    }

    #[test]
    fn indices_stay_inside_performer_count() {
        let performers: Vec<Performer> = (0..16u8).map(|i| perf(i * 8, i * 8 + 7, i * 4, 127)).collect();
        let dir = RegionDirector::new(&performers);
        for key in 0..128u8 {
            for vel in 0..128u8 {
                assert!(dir.lookup(key, vel).iter().all(|&ix| ix < performers.len()));
            }
        }
    }
}
