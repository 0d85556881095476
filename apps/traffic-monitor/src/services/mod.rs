pub mod traffic_images;
