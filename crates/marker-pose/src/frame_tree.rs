//! In-memory frame tree built from static transforms.

use marker_pose_core::RigidTransform;
use marker_pose_node::{FrameLookupError, FrameTree, TimeQuery, TransformStamped};
use std::collections::{BTreeMap, VecDeque};

/// Named frames connected by fixed transforms.
///
/// Each inserted edge is traversable in both directions, so any two frames in
/// the same connected component can be looked up. Time is ignored.
#[derive(Clone, Debug, Default)]
pub struct StaticFrameTree {
    // edges[a][b] = a_from_b
    edges: BTreeMap<String, BTreeMap<String, RigidTransform>>,
}

impl StaticFrameTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the edge `parent_from_child`.
    pub fn insert(
        &mut self,
        parent: impl Into<String>,
        child: impl Into<String>,
        parent_from_child: RigidTransform,
    ) {
        let (parent, child) = (parent.into(), child.into());
        self.edges
            .entry(child.clone())
            .or_default()
            .insert(parent.clone(), parent_from_child.inverse());
        self.edges
            .entry(parent)
            .or_default()
            .insert(child, parent_from_child);
    }

    /// Insert a stamped transform: header frame is the parent.
    pub fn insert_stamped(&mut self, t: &TransformStamped) {
        self.insert(t.header.frame_id.clone(), t.child_frame_id.clone(), t.transform);
    }

    pub fn contains(&self, frame: &str) -> bool {
        self.edges.contains_key(frame)
    }
}

impl FromIterator<TransformStamped> for StaticFrameTree {
    fn from_iter<I: IntoIterator<Item = TransformStamped>>(iter: I) -> Self {
        let mut tree = Self::new();
        for t in iter {
            tree.insert_stamped(&t);
        }
        tree
    }
}

impl FrameTree for StaticFrameTree {
    fn lookup_transform(
        &self,
        target: &str,
        source: &str,
        _time: TimeQuery,
    ) -> Result<RigidTransform, FrameLookupError> {
        for frame in [target, source] {
            if !self.contains(frame) {
                return Err(FrameLookupError::UnknownFrame(frame.to_string()));
            }
        }
        if target == source {
            return Ok(RigidTransform::identity());
        }

        // Breadth-first from `target`, carrying target_from_<frame>.
        let mut visited: BTreeMap<&str, RigidTransform> = BTreeMap::new();
        let mut queue = VecDeque::new();
        visited.insert(target, RigidTransform::identity());
        queue.push_back(target);

        while let Some(frame) = queue.pop_front() {
            let target_from_frame = visited[frame];
            let Some(neighbors) = self.edges.get(frame) else {
                continue;
            };
            for (next, frame_from_next) in neighbors {
                if visited.contains_key(next.as_str()) {
                    continue;
                }
                let target_from_next = target_from_frame.compose(frame_from_next);
                if next == source {
                    return Ok(target_from_next);
                }
                visited.insert(next.as_str(), target_from_next);
                queue.push_back(next.as_str());
            }
        }

        Err(FrameLookupError::Disconnected {
            target_frame: target.to_string(),
            source_frame: source.to_string(),
        })
    }
}
