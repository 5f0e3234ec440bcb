mod property_atomicity;
