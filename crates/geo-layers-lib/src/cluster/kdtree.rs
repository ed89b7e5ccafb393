//! Static 2D KD-tree over unit square coordinates
//!
//! Items are sorted in place into a flat array: each subarray's middle element is the
//! split for its axis, with the left half not greater and the right half not smaller.
//! Subarrays at or below `node_size` items are scanned linearly.

#[derive(Debug, Clone)]
struct Item {
    id: u32,
    coords: [f64; 2],
}

#[derive(Debug, Clone)]
pub(crate) struct KdTree {
    node_size: usize,
    items: Vec<Item>,
}

impl KdTree {
    /// Build a tree where each position's id is its index in the input
    pub(crate) fn build(positions: impl IntoIterator<Item = [f64; 2]>, node_size: usize) -> Self {
        let mut items: Vec<Item> = positions
            .into_iter()
            .enumerate()
            .map(|(id, coords)| Item {
                id: id as u32,
                coords,
            })
            .collect();
        let node_size = node_size.max(1);
        sort_axis(&mut items, node_size, 0);
        Self { node_size, items }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Ids of all items inside the rectangle, boundary inclusive
    pub(crate) fn range(&self, min: [f64; 2], max: [f64; 2]) -> Vec<usize> {
        let inside = |c: &[f64; 2]| c[0] >= min[0] && c[0] <= max[0] && c[1] >= min[1] && c[1] <= max[1];
        self.search(min, max, inside)
    }

    /// Ids of all items within `radius` of `center`
    pub(crate) fn within(&self, center: [f64; 2], radius: f64) -> Vec<usize> {
        let r2 = radius * radius;
        let min = [center[0] - radius, center[1] - radius];
        let max = [center[0] + radius, center[1] + radius];
        self.search(min, max, |c| {
            let dx = c[0] - center[0];
            let dy = c[1] - center[1];
            dx * dx + dy * dy <= r2
        })
    }

    fn search(&self, min: [f64; 2], max: [f64; 2], accept: impl Fn(&[f64; 2]) -> bool) -> Vec<usize> {
        let mut result = Vec::new();
        let mut stack = vec![(0usize, self.items.len(), 0usize)];

        while let Some((left, right, axis)) = stack.pop() {
            if right - left <= self.node_size {
                result.extend(
                    self.items[left..right]
                        .iter()
                        .filter(|item| accept(&item.coords))
                        .map(|item| item.id as usize),
                );
                continue;
            }

            let mid = left + (right - left) / 2;
            let item = &self.items[mid];
            if accept(&item.coords) {
                result.push(item.id as usize);
            }

            let split = item.coords[axis];
            if min[axis] <= split {
                stack.push((left, mid, 1 - axis));
            }
            if max[axis] >= split {
                stack.push((mid + 1, right, 1 - axis));
            }
        }

        result
    }
}

fn sort_axis(items: &mut [Item], node_size: usize, axis: usize) {
    if items.len() <= node_size {
        return;
    }
    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| a.coords[axis].total_cmp(&b.coords[axis]));
    let (left, right) = items.split_at_mut(mid);
    sort_axis(left, node_size, 1 - axis);
    sort_axis(&mut right[1..], node_size, 1 - axis);
}
