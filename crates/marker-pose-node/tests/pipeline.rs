use approx::assert_relative_eq;
use marker_pose_core::RigidTransform;
use marker_pose_node::{
    marker_object_points, CameraInfo, CollectingSink, DetectedMarkerRaw, DetectionBatch,
    FailurePolicy, FrameError, FrameLookupError, FrameTree, Header, ImageFrame, MarkerPoseNode,
    NodeConfigError, NodeParams, PoseFailureReason, RecordedDetections, Time, TimeQuery,
};
use nalgebra::{Point2, Rotation3, UnitQuaternion, Vector3};
use std::cell::{Cell, RefCell};

const K: [f64; 9] = [600.0, 0.0, 160.0, 0.0, 600.0, 120.0, 0.0, 0.0, 1.0];
const EDGE: f64 = 0.1;

fn camera_info() -> CameraInfo {
    CameraInfo {
        header: Header::new(Time::new(1, 0), "camera_rgb_optical_frame"),
        width: 320,
        height: 240,
        k: K,
        d: vec![],
    }
}

fn frame(encoding: &str) -> ImageFrame {
    let channels = if encoding == "mono8" { 1 } else { 3 };
    ImageFrame {
        header: Header::new(Time::new(42, 500), "camera_rgb_optical_frame"),
        width: 320,
        height: 240,
        encoding: encoding.into(),
        data: vec![128; 320 * 240 * channels],
    }
}

fn project(rotation: &Rotation3<f64>, translation: &Vector3<f64>) -> [Point2<f64>; 4] {
    let (fx, fy, cx, cy) = (K[0], K[4], K[2], K[5]);
    marker_object_points(EDGE).map(|p| {
        let pc = rotation * p + translation;
        Point2::new(fx * pc.x / pc.z + cx, fy * pc.y / pc.z + cy)
    })
}

fn good(id: i32, x: f64) -> DetectedMarkerRaw {
    DetectedMarkerRaw {
        id,
        corners: project(&Rotation3::identity(), &Vector3::new(x, 0.0, 1.0)),
    }
}

fn broken(id: i32) -> DetectedMarkerRaw {
    DetectedMarkerRaw {
        id,
        corners: [Point2::new(50.0, 50.0); 4],
    }
}

fn detections(markers: Vec<DetectedMarkerRaw>) -> RecordedDetections {
    RecordedDetections(DetectionBatch {
        markers,
        rejected: vec![],
    })
}

/// Frame tree holding a single transform; fails once `fail_after` lookups
/// have succeeded.
struct TestTree {
    global_from_camera: RigidTransform,
    fail_after: Option<usize>,
    calls: Cell<usize>,
    queried: RefCell<Vec<(String, String)>>,
}

impl TestTree {
    fn new(global_from_camera: RigidTransform) -> Self {
        Self {
            global_from_camera,
            fail_after: None,
            calls: Cell::new(0),
            queried: RefCell::new(Vec::new()),
        }
    }

    fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::new(RigidTransform::identity())
        }
    }
}

impl FrameTree for TestTree {
    fn lookup_transform(
        &self,
        target: &str,
        source: &str,
        time: TimeQuery,
    ) -> Result<RigidTransform, FrameLookupError> {
        assert_eq!(time, TimeQuery::Latest);
        self.queried
            .borrow_mut()
            .push((target.to_string(), source.to_string()));
        let n = self.calls.get();
        self.calls.set(n + 1);
        match self.fail_after {
            Some(limit) if n >= limit => Err(FrameLookupError::Disconnected {
                target_frame: target.to_string(),
                source_frame: source.to_string(),
            }),
            _ => Ok(self.global_from_camera),
        }
    }
}

fn ready_node(policy: FailurePolicy) -> MarkerPoseNode {
    let node = MarkerPoseNode::new(NodeParams {
        marker_size: EDGE,
        failure_policy: policy,
        ..Default::default()
    })
    .expect("valid params");
    node.on_camera_info(&camera_info()).expect("valid camera info");
    node
}

fn published_ids(sink: &CollectingSink) -> Vec<i32> {
    sink.marker_arrays[0].markers.iter().map(|m| m.id).collect()
}

#[test]
fn frames_before_camera_info_produce_nothing() {
    let node = MarkerPoseNode::new(NodeParams::default()).expect("valid params");
    let tree = TestTree::new(RigidTransform::identity());
    let mut sink = CollectingSink::default();

    let err = node
        .process_frame(
            &frame("bgr8"),
            &mut detections(vec![good(1, 0.0)]),
            &tree,
            &mut sink,
        )
        .unwrap_err();

    assert!(matches!(err, FrameError::NotReady(_)));
    assert!(sink.is_empty());
    assert_eq!(tree.calls.get(), 0);
}

#[test]
fn marker_pose_is_expressed_in_global_frame() {
    let node = ready_node(FailurePolicy::SkipMarker);
    let global_from_camera = RigidTransform::from_parts(
        Vector3::new(1.0, 2.0, 0.5),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2),
    );
    let tree = TestTree::new(global_from_camera);
    let mut sink = CollectingSink::default();
    let input = frame("bgr8");

    let summary = node
        .process_frame(
            &input,
            &mut detections(vec![good(7, 0.1)]),
            &tree,
            &mut sink,
        )
        .expect("frame ok");
    assert_eq!(summary.detected, 1);
    assert_eq!(summary.published, 1);
    assert_eq!(summary.transforms_sent, 1);

    let tf = &sink.transforms[0];
    assert_eq!(tf.header.frame_id, "camera_rgb_optical_frame");
    assert_eq!(tf.header.stamp, input.header.stamp);
    assert_eq!(tf.child_frame_id, "aruco_marker_7");
    assert_relative_eq!(tf.transform.translation[0], 0.1, epsilon = 1e-6);
    assert_relative_eq!(tf.transform.translation[2], 1.0, epsilon = 1e-6);

    let array = &sink.marker_arrays[0];
    assert_eq!(array.header, Header::new(input.header.stamp, "map"));
    let marker = &array.markers[0];
    assert_eq!(marker.id, 7);
    // (0.1, 0, 1) rotated 90 deg about z, then shifted.
    assert_relative_eq!(marker.pose.position[0], 1.0, epsilon = 1e-6);
    assert_relative_eq!(marker.pose.position[1], 2.1, epsilon = 1e-6);
    assert_relative_eq!(marker.pose.position[2], 1.5, epsilon = 1e-6);
    assert!((marker.pose.orientation.norm() - 1.0).abs() < 1e-9);
    let first = good(7, 0.1).corners[0];
    assert_eq!((marker.pixel_x, marker.pixel_y), (first.x, first.y));

    let image = &sink.images[0];
    assert_eq!(image.header, input.header);
    assert_eq!(image.encoding, "bgr8");
    assert_eq!(image.data.len(), input.data.len());
    assert_ne!(image.data, input.data, "overlay drawn");

    assert_eq!(
        tree.queried.borrow()[0],
        ("map".to_string(), "camera_rgb_optical_frame".to_string())
    );
}

#[test]
fn empty_detection_still_publishes_array_and_image() {
    let node = ready_node(FailurePolicy::AbortFrame);
    let tree = TestTree::new(RigidTransform::identity());
    let mut sink = CollectingSink::default();
    let input = frame("mono8");

    node.process_frame(&input, &mut detections(vec![]), &tree, &mut sink)
        .expect("frame ok");

    assert!(sink.transforms.is_empty());
    assert_eq!(sink.marker_arrays.len(), 1);
    assert!(sink.marker_arrays[0].markers.is_empty());
    assert_eq!(sink.images.len(), 1);
    assert_eq!(sink.images[0], input);
}

#[test]
fn skip_marker_policy_drops_only_failing_markers() {
    let shapes: Vec<(Vec<DetectedMarkerRaw>, Vec<i32>)> = vec![
        (vec![broken(1)], vec![]),
        (vec![good(1, 0.0), broken(2)], vec![1]),
        (vec![broken(1), good(2, 0.0), good(3, 0.1)], vec![2, 3]),
        (vec![good(1, -0.1), good(2, 0.0), broken(3)], vec![1, 2]),
        (vec![good(1, -0.1), broken(2), good(3, 0.1)], vec![1, 3]),
    ];

    for (markers, expected) in shapes {
        let node = ready_node(FailurePolicy::SkipMarker);
        let tree = TestTree::new(RigidTransform::identity());
        let mut sink = CollectingSink::default();

        let summary = node
            .process_frame(&frame("rgb8"), &mut detections(markers), &tree, &mut sink)
            .expect("frame kept");

        assert_eq!(published_ids(&sink), expected);
        assert_eq!(sink.transforms.len(), expected.len());
        assert_eq!(sink.images.len(), 1);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(
            summary.skipped[0].reason,
            PoseFailureReason::DegenerateHomography
        );
    }
}

#[test]
fn abort_frame_policy_publishes_no_array_or_image() {
    // (markers, transforms sent before the failure)
    let shapes: Vec<(Vec<DetectedMarkerRaw>, usize)> = vec![
        (vec![broken(1)], 0),
        (vec![broken(1), good(2, 0.0)], 0),
        (vec![good(1, 0.0), broken(2)], 1),
        (vec![good(1, -0.1), good(2, 0.0), broken(3)], 2),
    ];

    for (markers, sent) in shapes {
        let node = ready_node(FailurePolicy::AbortFrame);
        let tree = TestTree::new(RigidTransform::identity());
        let mut sink = CollectingSink::default();

        let err = node
            .process_frame(&frame("bgr8"), &mut detections(markers), &tree, &mut sink)
            .unwrap_err();

        assert!(matches!(err, FrameError::PoseFailure(_)));
        assert_eq!(sink.transforms.len(), sent);
        assert!(sink.marker_arrays.is_empty());
        assert!(sink.images.is_empty());
    }
}

#[test]
fn lookup_failure_after_broadcasts_suppresses_outputs() {
    for n in 0..3 {
        let node = ready_node(FailurePolicy::SkipMarker);
        let tree = TestTree::failing_after(n);
        let mut sink = CollectingSink::default();
        let markers = vec![good(1, -0.1), good(2, 0.0), good(3, 0.1)];

        let err = node
            .process_frame(&frame("bgr8"), &mut detections(markers), &tree, &mut sink)
            .unwrap_err();

        match err {
            FrameError::FrameLookup { marker_id, .. } => assert_eq!(marker_id, n as i32 + 1),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(sink.transforms.len(), n + 1);
        assert!(sink.marker_arrays.is_empty());
        assert!(sink.images.is_empty());
    }
}

#[test]
fn undecodable_image_is_dropped() {
    let node = ready_node(FailurePolicy::SkipMarker);
    let tree = TestTree::new(RigidTransform::identity());
    let mut sink = CollectingSink::default();
    let mut input = frame("bgr8");
    input.data.truncate(10);

    let err = node
        .process_frame(&input, &mut detections(vec![good(1, 0.0)]), &tree, &mut sink)
        .unwrap_err();
    assert!(matches!(err, FrameError::Decode(_)));
    assert!(sink.is_empty());
}

#[test]
fn global_frame_is_configurable() {
    let node = MarkerPoseNode::new(NodeParams {
        global_frame: "odom".into(),
        ..Default::default()
    })
    .expect("valid params");
    node.on_camera_info(&camera_info()).expect("valid camera info");
    let tree = TestTree::new(RigidTransform::identity());
    let mut sink = CollectingSink::default();

    node.process_frame(
        &frame("bgr8"),
        &mut detections(vec![good(4, 0.0)]),
        &tree,
        &mut sink,
    )
    .expect("frame ok");

    assert_eq!(sink.marker_arrays[0].header.frame_id, "odom");
    assert_eq!(sink.marker_arrays[0].markers[0].header.frame_id, "odom");
    assert_eq!(tree.queried.borrow()[0].0, "odom");
}

#[test]
fn invalid_configuration_is_rejected() {
    let err = MarkerPoseNode::new(NodeParams {
        dictionary: "DICT_9X9_1".into(),
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(err, NodeConfigError::InvalidDictionary(_)));

    let err = MarkerPoseNode::new(NodeParams {
        marker_size: 0.0,
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(err, NodeConfigError::InvalidMarkerSize(_)));
}

#[test]
fn invalid_camera_info_keeps_node_waiting() {
    let node = MarkerPoseNode::new(NodeParams::default()).expect("valid params");
    let mut info = camera_info();
    info.k = [0.0; 9];
    assert!(node.on_camera_info(&info).is_err());
    assert!(!node.intrinsics_store().is_ready());
}

#[test]
fn distortion_coefficients_do_not_change_poses() {
    let corners = project(
        &Rotation3::new(Vector3::new(0.2, -0.3, 0.1)),
        &Vector3::new(0.05, -0.02, 0.8),
    );
    let run = |d: Vec<f64>| {
        let node = MarkerPoseNode::new(NodeParams {
            marker_size: EDGE,
            ..Default::default()
        })
        .expect("valid params");
        node.on_camera_info(&CameraInfo { d, ..camera_info() })
            .expect("valid camera info");
        let tree = TestTree::new(RigidTransform::identity());
        let mut sink = CollectingSink::default();
        node.process_frame(
            &frame("bgr8"),
            &mut detections(vec![DetectedMarkerRaw { id: 4, corners }]),
            &tree,
            &mut sink,
        )
        .expect("frame ok");
        sink
    };

    let plain = run(vec![]);
    let distorted = run(vec![0.1, -0.05, 0.001, 0.002, 0.01]);

    assert_eq!(plain.transforms.len(), 1);
    assert_eq!(plain.transforms, distorted.transforms);
    assert_eq!(plain.marker_arrays, distorted.marker_arrays);
    assert_eq!(plain.images, distorted.images);
}
